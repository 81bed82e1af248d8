// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unauthenticated read-only routes: leaderboard and certificate checks.

use crate::error::Result;
use crate::services::leaderboard::DEFAULT_LIMIT;
use crate::services::{CertificateView, LeaderboardEntry};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/certificates/{credential_id}", get(verify_certificate))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Weekly leaderboard. Limit is 1..=100.
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let entries = state
        .leaderboard
        .get_weekly_leaderboard(params.limit)
        .await?;
    Ok(Json(entries))
}

/// Public certificate verification by credential id.
async fn verify_certificate(
    State(state): State<Arc<AppState>>,
    Path(credential_id): Path<String>,
) -> Result<Json<CertificateView>> {
    let view = state.certificates.verify(&credential_id).await?;
    Ok(Json(view))
}

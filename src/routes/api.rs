// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated learners.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{ProgressStatus, SubscriptionStatus};
use crate::services::streak::{is_active, visible_streak};
use crate::services::xp::{level_for_xp, xp_to_next_level};
use crate::services::{CompletionOutcome, CourseProgressSummary};
use crate::time_utils::utc_day;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/lessons/{lesson_id}/complete", post(complete_lesson))
        .route("/api/lessons/{lesson_id}/position", post(record_position))
        .route("/api/courses/{course_id}/progress", get(get_course_progress))
}

// ─── Learner Profile ─────────────────────────────────────────

/// Current learner response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    pub display_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    pub level: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_to_next_level: u64,
    /// Zero once the streak has lapsed
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_active: bool,
    pub subscription_status: SubscriptionStatus,
}

/// Get current learner's XP, level, and streak.
///
/// A learner with no activity yet gets a level 1 profile with zero XP.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let store = state.gateway.store();
    let (profile, streak) = tokio::try_join!(
        state.gateway.bounded(store.get_profile(&user.user_id)),
        state.gateway.bounded(store.get_streak(&user.user_id)),
    )?;

    let xp = profile.as_ref().map(|p| p.xp).unwrap_or(0);
    let today = utc_day(chrono::Utc::now());

    Ok(Json(MeResponse {
        display_name: profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user.display_name.clone()),
        subscription_status: profile
            .as_ref()
            .map(|p| p.subscription_status)
            .unwrap_or_default(),
        user_id: user.user_id,
        xp,
        level: level_for_xp(xp),
        xp_to_next_level: xp_to_next_level(xp),
        current_streak: visible_streak(streak.as_ref(), today),
        streak_active: streak
            .as_ref()
            .and_then(|s| s.last_activity_date)
            .is_some_and(|d| is_active(d, today)),
        longest_streak: streak.map(|s| s.longest_streak).unwrap_or(0),
    }))
}

// ─── Lessons ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CompleteLessonRequest {
    #[validate(length(min = 1, max = 128))]
    course_id: String,
}

/// Mark a lesson completed. Replays return the current state and grant
/// nothing new.
async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(lesson_id): Path<String>,
    Json(body): Json<CompleteLessonRequest>,
) -> Result<Json<CompletionOutcome>> {
    body.validate()?;

    let outcome = state
        .learning
        .complete_lesson(&user.user_id, &user.display_name, &lesson_id, &body.course_id)
        .await?;

    Ok(Json(outcome))
}

#[derive(Deserialize, Validate)]
struct PositionRequest {
    #[validate(length(min = 1, max = 128))]
    course_id: String,
    #[validate(range(min = 0.0, max = 86400.0))]
    seconds: f64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PositionResponse {
    pub status: String,
    pub lesson_status: ProgressStatus,
    pub last_position_seconds: f64,
}

/// Save the learner's playback position.
async fn record_position(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(lesson_id): Path<String>,
    Json(body): Json<PositionRequest>,
) -> Result<Json<PositionResponse>> {
    body.validate()?;

    let progress = state
        .progress
        .record_watch_position(&user.user_id, &lesson_id, &body.course_id, body.seconds)
        .await?;

    Ok(Json(PositionResponse {
        status: "ok".to_string(),
        lesson_status: progress.status,
        last_position_seconds: progress.last_position_seconds,
    }))
}

// ─── Courses ─────────────────────────────────────────────────

async fn get_course_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseProgressSummary>> {
    let summary = state
        .progress
        .get_course_progress(&user.user_id, &course_id)
        .await?;
    Ok(Json(summary))
}

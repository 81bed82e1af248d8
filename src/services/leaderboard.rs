// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly XP leaderboard.
//!
//! Weekly XP is the sum of XP events awarded in the trailing 7×24h window.
//! Results are cached per `limit` for a short TTL; a TTL of zero disables
//! the cache.

use crate::db::Gateway;
use crate::error::{AppError, Result};
use crate::models::XpEvent;
use crate::time_utils::format_utc_rfc3339;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Concurrent profile reads when resolving display names.
const PROFILE_FETCH_CONCURRENCY: usize = 10;

const ANONYMOUS_NAME: &str = "Anonymous learner";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub weekly_xp: u64,
}

/// Sum XP per user.
pub fn weekly_totals(events: &[XpEvent]) -> HashMap<String, u64> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for event in events {
        let total = totals.entry(event.user_id.clone()).or_default();
        *total = total.saturating_add(event.amount);
    }
    totals
}

/// Order by weekly XP descending, ties by user id ascending, and keep the
/// top `limit`. Returns `(rank, user_id, weekly_xp)`.
pub fn rank_entries(totals: HashMap<String, u64>, limit: usize) -> Vec<(u32, String, u64)> {
    let mut rows: Vec<(String, u64)> = totals.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (user_id, xp))| (i as u32 + 1, user_id, xp))
        .collect()
}

#[derive(Clone)]
pub struct LeaderboardService {
    gateway: Gateway,
    cache: Arc<DashMap<u32, (Instant, Vec<LeaderboardEntry>)>>,
    ttl: Duration,
}

impl LeaderboardService {
    pub fn new(gateway: Gateway, ttl: Duration) -> Self {
        Self {
            gateway,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Top `limit` learners by XP earned in the last 7 days.
    ///
    /// May be up to the cache TTL stale.
    pub async fn get_weekly_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        if !self.ttl.is_zero() {
            if let Some(cached) = self.cache.get(&limit) {
                let (computed_at, entries) = cached.value();
                if computed_at.elapsed() < self.ttl {
                    return Ok(entries.clone());
                }
            }
        }

        let entries = self.compute(limit).await?;

        if !self.ttl.is_zero() {
            self.cache.insert(limit, (Instant::now(), entries.clone()));
        }

        Ok(entries)
    }

    async fn compute(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let since = format_utc_rfc3339(chrono::Utc::now() - chrono::Duration::days(7));
        let events = self
            .gateway
            .bounded(self.gateway.store().xp_events_since(&since))
            .await?;

        let ranked = rank_entries(weekly_totals(&events), limit as usize);

        let mut entries: Vec<LeaderboardEntry> = stream::iter(ranked)
            .map(|(rank, user_id, weekly_xp)| async move {
                let profile = self
                    .gateway
                    .bounded(self.gateway.store().get_profile(&user_id))
                    .await?;
                let display_name = profile
                    .map(|p| p.display_name)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
                Ok::<_, AppError>(LeaderboardEntry {
                    rank,
                    user_id,
                    display_name,
                    weekly_xp,
                })
            })
            .buffer_unordered(PROFILE_FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        entries.sort_by_key(|e| e.rank);

        tracing::debug!(
            limit,
            events = events.len(),
            entries = entries.len(),
            "Leaderboard computed"
        );

        Ok(entries)
    }
}

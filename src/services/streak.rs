// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily activity streaks. Days are UTC calendar days.

use crate::db::Gateway;
use crate::error::Result;
use crate::models::StreakRecord;
use crate::time_utils::calendar_days_between;
use chrono::NaiveDate;

/// Whether a streak whose last activity was on `last_activity` is still
/// alive on `today`: true iff the gap is 0 or 1 calendar days.
pub fn is_active(last_activity: NaiveDate, today: NaiveDate) -> bool {
    matches!(calendar_days_between(last_activity, today), 0 | 1)
}

/// Streak as shown to the learner on `today`.
///
/// A streak that has lapsed reads as 0 even though the stored record keeps
/// the old count until the next activity resets it.
pub fn visible_streak(record: Option<&StreakRecord>, today: NaiveDate) -> u32 {
    match record {
        Some(r) if r.last_activity_date.is_some_and(|d| is_active(d, today)) => r.current_streak,
        _ => 0,
    }
}

#[derive(Clone)]
pub struct StreakEngine {
    gateway: Gateway,
}

impl StreakEngine {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Count qualifying activity for `today`. Repeat calls on the same day
    /// leave the streak unchanged.
    pub async fn touch_activity(&self, user_id: &str, today: NaiveDate) -> Result<StreakRecord> {
        let streak = self
            .gateway
            .bounded(self.gateway.store().touch_streak(user_id, today))
            .await?;

        tracing::debug!(
            user_id,
            %today,
            current = streak.current_streak,
            longest = streak.longest_streak,
            "Streak touched"
        );

        Ok(streak)
    }

    pub async fn get_streak(&self, user_id: &str) -> Result<Option<StreakRecord>> {
        Ok(self
            .gateway
            .bounded(self.gateway.store().get_streak(user_id))
            .await?)
    }
}

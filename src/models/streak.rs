// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily activity streak record.

use crate::time_utils::calendar_days_between;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored at: `user_streaks/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub user_id: String,
    /// Current consecutive-day streak
    #[serde(default)]
    pub current_streak: u32,
    /// Best streak ever reached
    #[serde(default)]
    pub longest_streak: u32,
    /// Last UTC calendar day with qualifying activity
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
}

impl StreakRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
        }
    }

    /// Count activity on `today`.
    ///
    /// Returns `false` when today was already counted (no change).
    pub fn touch(&mut self, today: NaiveDate) -> bool {
        let gap = self
            .last_activity_date
            .map(|last| calendar_days_between(last, today));

        match gap {
            Some(0) => return false,
            // Clock skew: an activity dated before the stored day is ignored.
            Some(days) if days < 0 => return false,
            Some(1) => self.current_streak += 1,
            _ => self.current_streak = 1,
        }

        self.last_activity_date = Some(today);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        true
    }
}

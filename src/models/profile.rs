// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Learner profile (XP ledger) and XP award events.

use crate::services::xp::level_for_xp;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Learner profile stored in Firestore.
///
/// Stored at: `profiles/{user_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Auth provider user ID (also used as document ID)
    pub user_id: String,
    /// Name shown on certificates and the leaderboard
    #[serde(default)]
    pub display_name: String,
    /// Cumulative XP. Never decreases.
    #[serde(default)]
    pub xp: u64,
    /// Denormalized copy of `level_for_xp(xp)`, rewritten with every award
    #[serde(default = "first_level")]
    pub level: u32,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn first_level() -> u32 {
    1
}

impl Profile {
    pub fn new(user_id: &str, display_name: &str, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            xp: 0,
            level: 1,
            subscription_status: SubscriptionStatus::None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Add XP and recompute the level from the new total.
    ///
    /// Returns the level before the award.
    pub fn apply_award(&mut self, amount: u64, now: &str) -> u32 {
        let previous = level_for_xp(self.xp);
        self.xp = self.xp.saturating_add(amount);
        self.level = level_for_xp(self.xp);
        self.updated_at = now.to_string();
        previous
    }

    /// Level derived from XP; ignores whatever is stored in `level`.
    pub fn current_level(&self) -> u32 {
        level_for_xp(self.xp)
    }
}

/// Billing subscription state, driven by provider webhooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Canceled,
}

/// What earned the XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpEventKind {
    LessonCompleted,
    CourseCompleted,
}

impl XpEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XpEventKind::LessonCompleted => "lesson_completed",
            XpEventKind::CourseCompleted => "course_completed",
        }
    }
}

/// One XP grant. At most one exists per (user, event key).
///
/// Stored at: `xp_events/{user_id}:{event_key}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpEvent {
    pub user_id: String,
    /// Logical event identity, e.g. `lesson_completed:intro-1`
    pub event_key: String,
    pub kind: XpEventKind,
    pub amount: u64,
    /// ISO 8601, always `Z`-suffixed so string order matches time order
    pub awarded_at: String,
}

impl XpEvent {
    pub fn new(user_id: &str, kind: XpEventKind, subject_id: &str, amount: u64, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            event_key: format!("{}:{}", kind.as_str(), subject_id),
            kind,
            amount,
            awarded_at: now.to_string(),
        }
    }
}

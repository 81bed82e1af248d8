// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lesson progress records and the per-course completion aggregate.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lesson watch status. Ordered: a record only ever moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Stored progress for one (user, lesson) pair.
///
/// Stored at: `lesson_progress/{user_id}:{lesson_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub user_id: String,
    pub lesson_id: String,
    pub course_id: String,
    #[serde(default)]
    pub status: ProgressStatus,
    /// Last watched position in seconds
    #[serde(default)]
    pub last_position_seconds: f64,
    /// When the lesson was first completed (ISO 8601)
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl LessonProgress {
    /// Fresh record for a lesson the user has never opened.
    pub fn new(user_id: &str, lesson_id: &str, course_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            course_id: course_id.to_string(),
            status: ProgressStatus::NotStarted,
            last_position_seconds: 0.0,
            completed_at: None,
            updated_at: String::new(),
        }
    }

    /// Record a new watch position.
    ///
    /// Moves `not_started` to `in_progress`; a completed lesson stays completed.
    pub fn record_position(&mut self, seconds: f64, now: &str) {
        self.last_position_seconds = seconds;
        if self.status == ProgressStatus::NotStarted {
            self.status = ProgressStatus::InProgress;
        }
        self.updated_at = now.to_string();
    }

    /// Mark the lesson completed.
    ///
    /// Returns `true` only when this call flipped the status to completed.
    /// Returns `false` (and changes nothing) if it was already completed.
    pub fn mark_completed(&mut self, now: &str) -> bool {
        if self.status == ProgressStatus::Completed {
            return false;
        }
        self.status = ProgressStatus::Completed;
        self.completed_at = Some(now.to_string());
        self.updated_at = now.to_string();
        true
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

/// Completed-lesson count for one (user, course) pair.
///
/// Stored at: `course_progress/{user_id}:{course_id}`
///
/// Incremented in the same atomic write that completes a lesson, so reading
/// course progress is a single document read instead of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub user_id: String,
    pub course_id: String,
    #[serde(default)]
    pub completed_lessons: u32,
    #[serde(default)]
    pub updated_at: String,
}

impl CourseProgress {
    pub fn new(user_id: &str, course_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            completed_lessons: 0,
            updated_at: String::new(),
        }
    }
}

/// Input for an atomic lesson completion write.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub user_id: String,
    /// Used when the profile does not exist yet
    pub display_name: String,
    pub lesson_id: String,
    pub course_id: String,
    /// XP granted if this write completes the lesson
    pub xp_amount: u64,
    pub now: String,
}

/// Outcome of an atomic lesson completion write.
#[derive(Debug, Clone)]
pub struct CompletionWrite {
    /// Progress record after the write
    pub progress: LessonProgress,
    /// Whether this call flipped the lesson to completed
    pub transitioned: bool,
    /// Completed lessons in the course after the write
    pub completed_in_course: u32,
    /// XP granted by this write (0 when not transitioned)
    pub xp_awarded: u64,
    /// Profile after the write
    pub profile: super::Profile,
}

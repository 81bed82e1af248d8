// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Courses, certificates, and credential reservations.

use serde::{Deserialize, Serialize};

/// Course catalog entry (managed by the admin console).
///
/// Stored at: `courses/{course_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    /// Lessons that make up the course; all are required for completion
    #[serde(default)]
    pub lesson_ids: Vec<String>,
}

impl Course {
    pub fn total_lessons(&self) -> u32 {
        self.lesson_ids.len() as u32
    }

    pub fn has_lesson(&self, lesson_id: &str) -> bool {
        self.lesson_ids.iter().any(|id| id == lesson_id)
    }
}

/// Issued course certificate. Immutable once written.
///
/// Stored at: `certificates/{user_id}:{course_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Public credential id (`CERT-XXXX-XXXX`)
    pub credential_id: String,
    pub user_id: String,
    pub course_id: String,
    /// ISO 8601
    pub issued_at: String,
}

/// Index entry claiming a credential id for one certificate slot.
///
/// Stored at: `credentials/{credential_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialReservation {
    pub credential_id: String,
    pub user_id: String,
    pub course_id: String,
    pub reserved_at: String,
}

/// Result of an insert-unique write.
///
/// `Existing` is the conflict case: the row was already there and is
/// returned unchanged. Callers treat it as success.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    Existing(T),
}

impl<T> InsertOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Inserted(v) | InsertOutcome::Existing(v) => v,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

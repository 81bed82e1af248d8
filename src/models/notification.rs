// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notifications published for external delivery.

use serde::{Deserialize, Serialize};

/// Stored at: `notifications/{id}`
///
/// Ids are derived from the triggering event, so publishing the same event
/// twice overwrites the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CertificateIssued,
    LevelUp,
}

impl Notification {
    pub fn certificate_issued(user_id: &str, course_title: &str, credential_id: &str, now: &str) -> Self {
        Self {
            id: format!("{}_certificate_{}", user_id, credential_id),
            user_id: user_id.to_string(),
            kind: NotificationKind::CertificateIssued,
            message: format!(
                "You earned a certificate for {} ({})",
                course_title, credential_id
            ),
            created_at: now.to_string(),
            read: false,
        }
    }

    pub fn level_up(user_id: &str, level: u32, now: &str) -> Self {
        Self {
            id: format!("{}_level_{}", user_id, level),
            user_id: user_id.to_string(),
            kind: NotificationKind::LevelUp,
            message: format!("You reached level {}", level),
            created_at: now.to_string(),
            read: false,
        }
    }
}

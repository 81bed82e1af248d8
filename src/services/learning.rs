// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lesson completion workflow.
//!
//! Handles the full flow behind "complete lesson":
//! 1. Flip the lesson to completed and grant lesson XP (one atomic write)
//! 2. Count today towards the learner's streak
//! 3. Issue the course certificate if every lesson is done
//! 4. Publish a level-up notification if the level increased
//!
//! Every step is idempotent, so a client that retries after a timeout
//! converges on the same state.

use crate::db::Gateway;
use crate::error::Result;
use crate::models::{Notification, ProgressStatus};
use crate::services::certificate::CertificateIssuer;
use crate::services::progress::ProgressTracker;
use crate::services::streak::StreakEngine;
use crate::services::xp::level_for_xp;
use crate::time_utils::{format_utc_rfc3339, utc_day};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Response for a completion request.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletionOutcome {
    pub status: ProgressStatus,
    /// XP granted by this call, including any course bonus
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_awarded: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub new_level: u32,
    pub streak: u32,
    /// Credential id when the course certificate exists
    pub certificate_issued: Option<String>,
}

#[derive(Clone)]
pub struct LearningService {
    gateway: Gateway,
    progress: ProgressTracker,
    streaks: StreakEngine,
    certificates: CertificateIssuer,
}

impl LearningService {
    pub fn new(
        gateway: Gateway,
        progress: ProgressTracker,
        streaks: StreakEngine,
        certificates: CertificateIssuer,
    ) -> Self {
        Self {
            gateway,
            progress,
            streaks,
            certificates,
        }
    }

    pub async fn complete_lesson(
        &self,
        user_id: &str,
        display_name: &str,
        lesson_id: &str,
        course_id: &str,
    ) -> Result<CompletionOutcome> {
        tracing::info!(user_id, lesson_id, course_id, "Processing lesson completion");

        // 1. Completion + lesson XP
        let write = self
            .progress
            .complete_lesson(user_id, display_name, lesson_id, course_id)
            .await?;
        let previous_level = level_for_xp(write.profile.xp.saturating_sub(write.xp_awarded));

        // 2. Streak (same-day repeats are no-ops)
        let today = utc_day(chrono::Utc::now());
        let streak = self.streaks.touch_activity(user_id, today).await?;

        // 3. Certificate. Runs on replays too, so a retry finishes an
        //    issuance that failed part way.
        let issued = self
            .certificates
            .issue_if_eligible(user_id, course_id)
            .await?;

        let mut profile = write.profile;
        let mut xp_awarded = write.xp_awarded;
        let mut certificate_issued = None;
        if let Some(issued) = issued {
            if let Some(bonus_profile) = issued.bonus_profile {
                xp_awarded += issued.bonus_xp;
                profile = bonus_profile;
            }
            certificate_issued = Some(issued.certificate.credential_id);
        }

        // 4. Level-up notification, keyed by level
        let new_level = profile.current_level();
        if new_level > previous_level {
            let notification = Notification::level_up(
                user_id,
                new_level,
                &format_utc_rfc3339(chrono::Utc::now()),
            );
            self.gateway
                .bounded(self.gateway.store().publish_notification(&notification))
                .await?;
            tracing::info!(user_id, previous_level, new_level, "Level up");
        }

        Ok(CompletionOutcome {
            status: write.progress.status,
            xp_awarded,
            total_xp: profile.xp,
            new_level,
            streak: streak.current_streak,
            certificate_issued,
        })
    }
}

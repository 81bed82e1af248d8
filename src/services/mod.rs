// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod billing;
pub mod certificate;
pub mod leaderboard;
pub mod learning;
pub mod progress;
pub mod streak;
pub mod xp;

pub use billing::{BillingService, WebhookError};
pub use certificate::{CertificateIssuer, CertificateView};
pub use leaderboard::{LeaderboardEntry, LeaderboardService};
pub use learning::{CompletionOutcome, LearningService};
pub use progress::{CourseProgressSummary, ProgressTracker};
pub use streak::StreakEngine;
pub use xp::XpLedger;

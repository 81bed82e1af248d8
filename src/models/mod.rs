// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod certificate;
pub mod notification;
pub mod profile;
pub mod progress;
pub mod streak;

pub use certificate::{Certificate, Course, CredentialReservation, InsertOutcome};
pub use notification::{Notification, NotificationKind};
pub use profile::{Profile, SubscriptionStatus, XpEvent, XpEventKind};
pub use progress::{CompletionRequest, CompletionWrite, CourseProgress, LessonProgress, ProgressStatus};
pub use streak::StreakRecord;

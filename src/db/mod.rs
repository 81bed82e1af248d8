// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer.
//!
//! Services talk to storage only through the [`LearningStore`] trait, held
//! in a [`Gateway`] that bounds every call with the configured timeout.
//! Operations that must not lose updates (completion, XP, streaks) are
//! single atomic calls on the store, never read-modify-write in a service.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::models::{
    Certificate, CompletionRequest, CompletionWrite, Course, CourseProgress,
    CredentialReservation, InsertOutcome, LessonProgress, Notification, Profile, StreakRecord,
    SubscriptionStatus, XpEvent,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const COURSES: &str = "courses";
    pub const LESSON_PROGRESS: &str = "lesson_progress";
    /// Completed-lesson counts (keyed by user and course)
    pub const COURSE_PROGRESS: &str = "course_progress";
    pub const USER_STREAKS: &str = "user_streaks";
    pub const XP_EVENTS: &str = "xp_events";
    pub const CERTIFICATES: &str = "certificates";
    /// Credential id reservations (uniqueness index for certificates)
    pub const CREDENTIALS: &str = "credentials";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Errors surfaced by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or rejected the call. Retryable with backoff.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time. Outcome unknown.
    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),

    /// Stored data could not be (de)serialized.
    #[error("Storage data error: {0}")]
    Data(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document id for a record keyed by two ids.
///
/// Parts are percent-encoded, so ':' cannot appear inside one.
pub fn composite_id(first: &str, second: &str) -> String {
    format!(
        "{}:{}",
        urlencoding::encode(first),
        urlencoding::encode(second)
    )
}

/// The typed persistence contract consumed by the services.
#[async_trait]
pub trait LearningStore: Send + Sync {
    // ─── Profiles ────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Atomically set the subscription status. `None` if no profile exists.
    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        now: &str,
    ) -> StoreResult<Option<Profile>>;

    // ─── Courses ─────────────────────────────────────────────────

    async fn get_course(&self, course_id: &str) -> StoreResult<Option<Course>>;

    async fn upsert_course(&self, course: &Course) -> StoreResult<()>;

    // ─── Progress ────────────────────────────────────────────────

    async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>>;

    /// Atomic upsert of the watch position (status never regresses).
    async fn record_watch_position(
        &self,
        user_id: &str,
        lesson_id: &str,
        course_id: &str,
        seconds: f64,
        now: &str,
    ) -> StoreResult<LessonProgress>;

    /// Atomic compare-and-set completion.
    ///
    /// In one write: flips the lesson to completed, bumps the course count,
    /// adds the lesson XP and records the XP event. If the lesson was
    /// already completed, nothing is written.
    async fn complete_lesson(&self, request: &CompletionRequest) -> StoreResult<CompletionWrite>;

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<CourseProgress>>;

    // ─── XP ──────────────────────────────────────────────────────

    /// Atomically record the event and add its XP to the profile.
    ///
    /// Returns `None` if an event with the same key was already recorded.
    async fn award_xp(&self, event: &XpEvent) -> StoreResult<Option<Profile>>;

    /// All XP events awarded at or after `since` (RFC3339, `Z` suffix).
    async fn xp_events_since(&self, since: &str) -> StoreResult<Vec<XpEvent>>;

    // ─── Streaks ─────────────────────────────────────────────────

    async fn get_streak(&self, user_id: &str) -> StoreResult<Option<StreakRecord>>;

    /// Atomically apply `StreakRecord::touch(today)`.
    async fn touch_streak(&self, user_id: &str, today: NaiveDate) -> StoreResult<StreakRecord>;

    // ─── Certificates ────────────────────────────────────────────

    /// Insert-unique on the credential id. `false` if already taken.
    async fn reserve_credential(&self, reservation: &CredentialReservation) -> StoreResult<bool>;

    async fn release_credential(&self, credential_id: &str) -> StoreResult<()>;

    /// Insert-unique on (user, course); returns the existing row on conflict.
    async fn insert_certificate(
        &self,
        certificate: &Certificate,
    ) -> StoreResult<InsertOutcome<Certificate>>;

    async fn get_certificate(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<Certificate>>;

    /// Look up through the credential index. A reservation that never got a
    /// certificate (or lost the race) resolves to `None`.
    async fn get_certificate_by_credential(
        &self,
        credential_id: &str,
    ) -> StoreResult<Option<Certificate>>;

    // ─── Notifications ───────────────────────────────────────────

    async fn publish_notification(&self, notification: &Notification) -> StoreResult<()>;
}

/// Shared handle to the store, bounding each call with a timeout.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn LearningStore>,
    timeout: Duration,
}

impl Gateway {
    pub fn new(store: Arc<dyn LearningStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &dyn LearningStore {
        self.store.as_ref()
    }

    /// Await a store call, failing with `StoreError::Timeout` past the limit.
    pub async fn bounded<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

// ─── Write Plans ─────────────────────────────────────────────────
//
// Both stores read the current documents inside their atomic section, run
// one of these pure functions, and persist what it returns.

/// Documents to write for a lesson completion.
#[derive(Debug, Clone)]
pub struct CompletionPlan {
    pub write: CompletionWrite,
    /// Present only when the lesson transitioned
    pub course_progress: Option<CourseProgress>,
    /// Present only when the lesson transitioned
    pub xp_event: Option<XpEvent>,
}

pub fn plan_completion(
    progress: Option<LessonProgress>,
    course_progress: Option<CourseProgress>,
    profile: Option<Profile>,
    request: &CompletionRequest,
) -> CompletionPlan {
    let mut progress = progress.unwrap_or_else(|| {
        LessonProgress::new(&request.user_id, &request.lesson_id, &request.course_id)
    });
    let mut course_progress = course_progress
        .unwrap_or_else(|| CourseProgress::new(&request.user_id, &request.course_id));
    let mut profile = profile
        .unwrap_or_else(|| Profile::new(&request.user_id, &request.display_name, &request.now));

    if !progress.mark_completed(&request.now) {
        return CompletionPlan {
            write: CompletionWrite {
                progress,
                transitioned: false,
                completed_in_course: course_progress.completed_lessons,
                xp_awarded: 0,
                profile,
            },
            course_progress: None,
            xp_event: None,
        };
    }

    // The count below belongs to the completing course, so the row must too
    progress.course_id = request.course_id.clone();
    course_progress.completed_lessons += 1;
    course_progress.updated_at = request.now.clone();

    profile.apply_award(request.xp_amount, &request.now);
    let xp_event = XpEvent::new(
        &request.user_id,
        crate::models::XpEventKind::LessonCompleted,
        &request.lesson_id,
        request.xp_amount,
        &request.now,
    );

    CompletionPlan {
        write: CompletionWrite {
            progress,
            transitioned: true,
            completed_in_course: course_progress.completed_lessons,
            xp_awarded: request.xp_amount,
            profile,
        },
        course_progress: Some(course_progress),
        xp_event: Some(xp_event),
    }
}

/// Profile after an award, or `None` if the event was already recorded.
pub fn plan_award(
    already_recorded: bool,
    profile: Option<Profile>,
    event: &XpEvent,
) -> Option<Profile> {
    if already_recorded {
        return None;
    }
    let mut profile = profile.unwrap_or_else(|| Profile::new(&event.user_id, "", &event.awarded_at));
    profile.apply_award(event.amount, &event.awarded_at);
    Some(profile)
}

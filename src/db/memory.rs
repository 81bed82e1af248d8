// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! All collections sit behind one lock, so every trait call is atomic with
//! respect to every other. Latency and outages can be injected to exercise
//! the timeout and unavailability paths.

use crate::db::{
    composite_id, plan_award, plan_completion, LearningStore, StoreError, StoreResult,
};
use crate::models::{
    Certificate, CompletionRequest, CompletionWrite, Course, CourseProgress,
    CredentialReservation, InsertOutcome, LessonProgress, Notification, Profile, StreakRecord,
    SubscriptionStatus, XpEvent,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    courses: HashMap<String, Course>,
    lesson_progress: HashMap<String, LessonProgress>,
    course_progress: HashMap<String, CourseProgress>,
    streaks: HashMap<String, StreakRecord>,
    xp_events: HashMap<String, XpEvent>,
    certificates: HashMap<String, Certificate>,
    credentials: HashMap<String, CredentialReservation>,
    notifications: HashMap<String, Notification>,
}

/// Memory-backed [`LearningStore`].
pub struct MemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stored notifications for a user.
    pub async fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        let tables = self.tables.lock().await;
        tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Number of certificate documents, across all users.
    pub async fn certificate_count(&self) -> usize {
        self.tables.lock().await.certificates.len()
    }

    async fn check(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LearningStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.check().await?;
        Ok(self.tables.lock().await.profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.check().await?;
        self.tables
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        now: &str,
    ) -> StoreResult<Option<Profile>> {
        self.check().await?;
        let mut tables = self.tables.lock().await;
        Ok(tables.profiles.get_mut(user_id).map(|profile| {
            profile.subscription_status = status;
            profile.updated_at = now.to_string();
            profile.clone()
        }))
    }

    async fn get_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        self.check().await?;
        Ok(self.tables.lock().await.courses.get(course_id).cloned())
    }

    async fn upsert_course(&self, course: &Course) -> StoreResult<()> {
        self.check().await?;
        self.tables
            .lock()
            .await
            .courses
            .insert(course.course_id.clone(), course.clone());
        Ok(())
    }

    async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>> {
        self.check().await?;
        let id = composite_id(user_id, lesson_id);
        Ok(self.tables.lock().await.lesson_progress.get(&id).cloned())
    }

    async fn record_watch_position(
        &self,
        user_id: &str,
        lesson_id: &str,
        course_id: &str,
        seconds: f64,
        now: &str,
    ) -> StoreResult<LessonProgress> {
        self.check().await?;
        let id = composite_id(user_id, lesson_id);
        let mut tables = self.tables.lock().await;
        let progress = tables
            .lesson_progress
            .entry(id)
            .or_insert_with(|| LessonProgress::new(user_id, lesson_id, course_id));
        progress.record_position(seconds, now);
        Ok(progress.clone())
    }

    async fn complete_lesson(&self, request: &CompletionRequest) -> StoreResult<CompletionWrite> {
        self.check().await?;
        let progress_id = composite_id(&request.user_id, &request.lesson_id);
        let course_progress_id = composite_id(&request.user_id, &request.course_id);

        let mut tables = self.tables.lock().await;
        let plan = plan_completion(
            tables.lesson_progress.get(&progress_id).cloned(),
            tables.course_progress.get(&course_progress_id).cloned(),
            tables.profiles.get(&request.user_id).cloned(),
            request,
        );

        if plan.write.transitioned {
            tables
                .lesson_progress
                .insert(progress_id, plan.write.progress.clone());
            if let Some(course_progress) = plan.course_progress {
                tables
                    .course_progress
                    .insert(course_progress_id, course_progress);
            }
            if let Some(event) = plan.xp_event {
                tables
                    .xp_events
                    .insert(composite_id(&event.user_id, &event.event_key), event);
            }
            tables
                .profiles
                .insert(request.user_id.clone(), plan.write.profile.clone());
        }

        Ok(plan.write)
    }

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<CourseProgress>> {
        self.check().await?;
        let id = composite_id(user_id, course_id);
        Ok(self.tables.lock().await.course_progress.get(&id).cloned())
    }

    async fn award_xp(&self, event: &XpEvent) -> StoreResult<Option<Profile>> {
        self.check().await?;
        let event_id = composite_id(&event.user_id, &event.event_key);
        let mut tables = self.tables.lock().await;

        let updated = plan_award(
            tables.xp_events.contains_key(&event_id),
            tables.profiles.get(&event.user_id).cloned(),
            event,
        );
        if let Some(profile) = &updated {
            tables.xp_events.insert(event_id, event.clone());
            tables
                .profiles
                .insert(profile.user_id.clone(), profile.clone());
        }
        Ok(updated)
    }

    async fn xp_events_since(&self, since: &str) -> StoreResult<Vec<XpEvent>> {
        self.check().await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .xp_events
            .values()
            .filter(|e| e.awarded_at.as_str() >= since)
            .cloned()
            .collect())
    }

    async fn get_streak(&self, user_id: &str) -> StoreResult<Option<StreakRecord>> {
        self.check().await?;
        Ok(self.tables.lock().await.streaks.get(user_id).cloned())
    }

    async fn touch_streak(&self, user_id: &str, today: NaiveDate) -> StoreResult<StreakRecord> {
        self.check().await?;
        let mut tables = self.tables.lock().await;
        let streak = tables
            .streaks
            .entry(user_id.to_string())
            .or_insert_with(|| StreakRecord::new(user_id));
        streak.touch(today);
        Ok(streak.clone())
    }

    async fn reserve_credential(&self, reservation: &CredentialReservation) -> StoreResult<bool> {
        self.check().await?;
        let mut tables = self.tables.lock().await;
        if tables.credentials.contains_key(&reservation.credential_id) {
            return Ok(false);
        }
        tables
            .credentials
            .insert(reservation.credential_id.clone(), reservation.clone());
        Ok(true)
    }

    async fn release_credential(&self, credential_id: &str) -> StoreResult<()> {
        self.check().await?;
        self.tables.lock().await.credentials.remove(credential_id);
        Ok(())
    }

    async fn insert_certificate(
        &self,
        certificate: &Certificate,
    ) -> StoreResult<InsertOutcome<Certificate>> {
        self.check().await?;
        let id = composite_id(&certificate.user_id, &certificate.course_id);
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.certificates.get(&id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        tables.certificates.insert(id, certificate.clone());
        Ok(InsertOutcome::Inserted(certificate.clone()))
    }

    async fn get_certificate(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<Certificate>> {
        self.check().await?;
        let id = composite_id(user_id, course_id);
        Ok(self.tables.lock().await.certificates.get(&id).cloned())
    }

    async fn get_certificate_by_credential(
        &self,
        credential_id: &str,
    ) -> StoreResult<Option<Certificate>> {
        self.check().await?;
        let tables = self.tables.lock().await;
        let Some(reservation) = tables.credentials.get(credential_id) else {
            return Ok(None);
        };
        let id = composite_id(&reservation.user_id, &reservation.course_id);
        Ok(tables
            .certificates
            .get(&id)
            .filter(|c| c.credential_id == credential_id)
            .cloned())
    }

    async fn publish_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.check().await?;
        self.tables
            .lock()
            .await
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }
}

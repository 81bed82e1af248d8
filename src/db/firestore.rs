// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed store.
//!
//! Atomic operations run inside `run_transaction`: documents read through
//! the transaction handle are registered for conflict detection, and
//! Firestore retries the closure with fresh data if another request wrote
//! them first. Insert-unique operations use `create` semantics and map the
//! already-exists conflict to the "existing" outcome.

use crate::db::{
    collections, composite_id, plan_award, plan_completion, LearningStore, StoreError,
    StoreResult,
};
use crate::models::{
    Certificate, CompletionRequest, CompletionWrite, Course, CourseProgress,
    CredentialReservation, InsertOutcome, LessonProgress, Notification, Profile, StreakRecord,
    SubscriptionStatus, XpEvent,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use firestore::errors::FirestoreError;
use futures_util::FutureExt;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

/// Map a Firestore failure onto the store taxonomy.
fn store_error(e: FirestoreError) -> StoreError {
    match e {
        FirestoreError::SerializeError(_) | FirestoreError::DeserializeError(_) => {
            StoreError::Data(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> StoreResult<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> StoreResult<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Read one document by id.
    async fn get_doc<T>(&self, collection: &str, id: &str) -> StoreResult<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(store_error)
    }

    /// Create or overwrite one document.
    async fn set_doc<T>(&self, collection: &str, id: &str, value: &T) -> StoreResult<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(value)
            .execute()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    /// Create a document only if the id is free.
    ///
    /// Returns `false` when a document with this id already exists.
    async fn create_doc<T>(&self, collection: &str, id: &str, value: &T) -> StoreResult<bool>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let result: Result<T, FirestoreError> = self
            .client
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(value)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(store_error(e)),
        }
    }
}

#[async_trait]
impl LearningStore for FirestoreStore {
    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.get_doc(collections::PROFILES, user_id).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.set_doc(collections::PROFILES, &profile.user_id, profile)
            .await
    }

    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        now: &str,
    ) -> StoreResult<Option<Profile>> {
        let user_id = user_id.to_string();
        let now = now.to_string();

        self.client
            .run_transaction(move |db, transaction| {
                let user_id = user_id.clone();
                let now = now.clone();
                async move {
                    let profile: Option<Profile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let Some(mut profile) = profile else {
                        return Ok(None);
                    };
                    profile.subscription_status = status;
                    profile.updated_at = now;

                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&user_id)
                        .object(&profile)
                        .add_to_transaction(transaction)?;

                    Ok(Some(profile))
                }
                .boxed()
            })
            .await
            .map_err(store_error)
    }

    // ─── Course Operations ───────────────────────────────────────

    async fn get_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        self.get_doc(collections::COURSES, course_id).await
    }

    async fn upsert_course(&self, course: &Course) -> StoreResult<()> {
        self.set_doc(collections::COURSES, &course.course_id, course)
            .await
    }

    // ─── Progress Operations ─────────────────────────────────────

    async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>> {
        self.get_doc(
            collections::LESSON_PROGRESS,
            &composite_id(user_id, lesson_id),
        )
        .await
    }

    async fn record_watch_position(
        &self,
        user_id: &str,
        lesson_id: &str,
        course_id: &str,
        seconds: f64,
        now: &str,
    ) -> StoreResult<LessonProgress> {
        let doc_id = composite_id(user_id, lesson_id);
        let fresh = LessonProgress::new(user_id, lesson_id, course_id);
        let now = now.to_string();

        self.client
            .run_transaction(move |db, transaction| {
                let doc_id = doc_id.clone();
                let fresh = fresh.clone();
                let now = now.clone();
                async move {
                    let existing: Option<LessonProgress> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::LESSON_PROGRESS)
                        .obj()
                        .one(&doc_id)
                        .await?;

                    let mut progress = existing.unwrap_or(fresh);
                    progress.record_position(seconds, &now);

                    db.fluent()
                        .update()
                        .in_col(collections::LESSON_PROGRESS)
                        .document_id(&doc_id)
                        .object(&progress)
                        .add_to_transaction(transaction)?;

                    Ok(progress)
                }
                .boxed()
            })
            .await
            .map_err(store_error)
    }

    async fn complete_lesson(&self, request: &CompletionRequest) -> StoreResult<CompletionWrite> {
        let request = request.clone();

        let write = self
            .client
            .run_transaction(move |db, transaction| {
                let request = request.clone();
                async move {
                    let progress_id = composite_id(&request.user_id, &request.lesson_id);
                    let course_progress_id = composite_id(&request.user_id, &request.course_id);

                    // 1. Read everything the write depends on within the transaction
                    let progress: Option<LessonProgress> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::LESSON_PROGRESS)
                        .obj()
                        .one(&progress_id)
                        .await?;
                    let course_progress: Option<CourseProgress> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::COURSE_PROGRESS)
                        .obj()
                        .one(&course_progress_id)
                        .await?;
                    let profile: Option<Profile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&request.user_id)
                        .await?;

                    // 2. Compare-and-set: nothing to write if already completed
                    let plan = plan_completion(progress, course_progress, profile, &request);
                    if !plan.write.transitioned {
                        return Ok(plan.write);
                    }

                    // 3. Progress, count, XP event and profile commit together
                    db.fluent()
                        .update()
                        .in_col(collections::LESSON_PROGRESS)
                        .document_id(&progress_id)
                        .object(&plan.write.progress)
                        .add_to_transaction(transaction)?;

                    if let Some(course_progress) = &plan.course_progress {
                        db.fluent()
                            .update()
                            .in_col(collections::COURSE_PROGRESS)
                            .document_id(&course_progress_id)
                            .object(course_progress)
                            .add_to_transaction(transaction)?;
                    }

                    if let Some(event) = &plan.xp_event {
                        db.fluent()
                            .update()
                            .in_col(collections::XP_EVENTS)
                            .document_id(composite_id(&event.user_id, &event.event_key))
                            .object(event)
                            .add_to_transaction(transaction)?;
                    }

                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&request.user_id)
                        .object(&plan.write.profile)
                        .add_to_transaction(transaction)?;

                    Ok(plan.write)
                }
                .boxed()
            })
            .await
            .map_err(store_error)?;

        if write.transitioned {
            tracing::info!(
                user_id = %write.progress.user_id,
                lesson_id = %write.progress.lesson_id,
                xp = write.xp_awarded,
                "Lesson completion committed"
            );
        }

        Ok(write)
    }

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<CourseProgress>> {
        self.get_doc(
            collections::COURSE_PROGRESS,
            &composite_id(user_id, course_id),
        )
        .await
    }

    // ─── XP Operations ───────────────────────────────────────────

    async fn award_xp(&self, event: &XpEvent) -> StoreResult<Option<Profile>> {
        let event = event.clone();

        self.client
            .run_transaction(move |db, transaction| {
                let event = event.clone();
                async move {
                    let event_id = composite_id(&event.user_id, &event.event_key);

                    let recorded: Option<XpEvent> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::XP_EVENTS)
                        .obj()
                        .one(&event_id)
                        .await?;
                    let profile: Option<Profile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&event.user_id)
                        .await?;

                    let Some(profile) = plan_award(recorded.is_some(), profile, &event) else {
                        return Ok(None);
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::XP_EVENTS)
                        .document_id(&event_id)
                        .object(&event)
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&event.user_id)
                        .object(&profile)
                        .add_to_transaction(transaction)?;

                    Ok(Some(profile))
                }
                .boxed()
            })
            .await
            .map_err(store_error)
    }

    async fn xp_events_since(&self, since: &str) -> StoreResult<Vec<XpEvent>> {
        let since = since.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::XP_EVENTS)
            .filter(move |q| q.for_all([q.field("awarded_at").greater_than_or_equal(since.clone())]))
            .obj()
            .query()
            .await
            .map_err(store_error)
    }

    // ─── Streak Operations ───────────────────────────────────────

    async fn get_streak(&self, user_id: &str) -> StoreResult<Option<StreakRecord>> {
        self.get_doc(collections::USER_STREAKS, user_id).await
    }

    async fn touch_streak(&self, user_id: &str, today: NaiveDate) -> StoreResult<StreakRecord> {
        let user_id = user_id.to_string();

        self.client
            .run_transaction(move |db, transaction| {
                let user_id = user_id.clone();
                async move {
                    let existing: Option<StreakRecord> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USER_STREAKS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let mut streak = existing.unwrap_or_else(|| StreakRecord::new(&user_id));
                    if streak.touch(today) {
                        db.fluent()
                            .update()
                            .in_col(collections::USER_STREAKS)
                            .document_id(&user_id)
                            .object(&streak)
                            .add_to_transaction(transaction)?;
                    }

                    Ok(streak)
                }
                .boxed()
            })
            .await
            .map_err(store_error)
    }

    // ─── Certificate Operations ──────────────────────────────────

    async fn reserve_credential(&self, reservation: &CredentialReservation) -> StoreResult<bool> {
        self.create_doc(
            collections::CREDENTIALS,
            &reservation.credential_id,
            reservation,
        )
        .await
    }

    async fn release_credential(&self, credential_id: &str) -> StoreResult<()> {
        self.client
            .fluent()
            .delete()
            .from(collections::CREDENTIALS)
            .document_id(credential_id)
            .execute()
            .await
            .map_err(store_error)
    }

    async fn insert_certificate(
        &self,
        certificate: &Certificate,
    ) -> StoreResult<InsertOutcome<Certificate>> {
        let doc_id = composite_id(&certificate.user_id, &certificate.course_id);

        if self
            .create_doc(collections::CERTIFICATES, &doc_id, certificate)
            .await?
        {
            return Ok(InsertOutcome::Inserted(certificate.clone()));
        }

        // Lost the race (or a retry): hand back the row that won
        let existing: Option<Certificate> =
            self.get_doc(collections::CERTIFICATES, &doc_id).await?;
        existing.map(InsertOutcome::Existing).ok_or_else(|| {
            StoreError::Data(format!(
                "Certificate {} conflicted but could not be read back",
                doc_id
            ))
        })
    }

    async fn get_certificate(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<Certificate>> {
        self.get_doc(collections::CERTIFICATES, &composite_id(user_id, course_id))
            .await
    }

    async fn get_certificate_by_credential(
        &self,
        credential_id: &str,
    ) -> StoreResult<Option<Certificate>> {
        let reservation: Option<CredentialReservation> =
            self.get_doc(collections::CREDENTIALS, credential_id).await?;
        let Some(reservation) = reservation else {
            return Ok(None);
        };

        let certificate = self
            .get_certificate(&reservation.user_id, &reservation.course_id)
            .await?;
        Ok(certificate.filter(|c| c.credential_id == credential_id))
    }

    // ─── Notification Operations ─────────────────────────────────

    async fn publish_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.set_doc(collections::NOTIFICATIONS, &notification.id, notification)
            .await
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lesson progress tracking.

use crate::db::Gateway;
use crate::error::{AppError, Result};
use crate::models::{CompletionRequest, CompletionWrite, LessonProgress};
use crate::time_utils::format_utc_rfc3339;
use crate::validation::{check_id, check_position};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Completed-lesson count for one course.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CourseProgressSummary {
    pub course_id: String,
    pub completed_lessons: u32,
    /// `None` if the course is not in the catalog
    pub total_lessons: Option<u32>,
    pub is_complete: bool,
}

/// Records watch positions and completions per (user, lesson).
#[derive(Clone)]
pub struct ProgressTracker {
    gateway: Gateway,
    lesson_xp: u64,
}

impl ProgressTracker {
    pub fn new(gateway: Gateway, lesson_xp: u64) -> Self {
        Self { gateway, lesson_xp }
    }

    /// Save the learner's position in a lesson.
    ///
    /// Starts the lesson if needed; never un-completes it. Safe to retry.
    pub async fn record_watch_position(
        &self,
        user_id: &str,
        lesson_id: &str,
        course_id: &str,
        seconds: f64,
    ) -> Result<LessonProgress> {
        check_id("lesson_id", lesson_id)?;
        check_id("course_id", course_id)?;
        check_position(seconds)?;
        self.catalog_lesson(lesson_id, course_id).await?;

        let now = format_utc_rfc3339(chrono::Utc::now());
        let progress = self
            .gateway
            .bounded(self.gateway.store().record_watch_position(
                user_id, lesson_id, course_id, seconds, &now,
            ))
            .await?;

        tracing::debug!(
            user_id,
            lesson_id,
            seconds,
            status = ?progress.status,
            "Watch position recorded"
        );

        Ok(progress)
    }

    /// Mark a lesson completed and grant the lesson XP.
    ///
    /// The XP is part of the same compare-and-set write as the status flip,
    /// so duplicate or replayed calls return `transitioned == false` and
    /// grant nothing.
    pub async fn complete_lesson(
        &self,
        user_id: &str,
        display_name: &str,
        lesson_id: &str,
        course_id: &str,
    ) -> Result<CompletionWrite> {
        check_id("lesson_id", lesson_id)?;
        check_id("course_id", course_id)?;
        self.catalog_lesson(lesson_id, course_id).await?;

        let request = CompletionRequest {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            lesson_id: lesson_id.to_string(),
            course_id: course_id.to_string(),
            xp_amount: self.lesson_xp,
            now: format_utc_rfc3339(chrono::Utc::now()),
        };

        let write = self
            .gateway
            .bounded(self.gateway.store().complete_lesson(&request))
            .await?;

        if write.transitioned {
            tracing::info!(
                user_id,
                lesson_id,
                course_id,
                completed_in_course = write.completed_in_course,
                "Lesson completed"
            );
        } else {
            tracing::debug!(
                user_id,
                lesson_id,
                "Lesson already completed (idempotent skip)"
            );
        }

        Ok(write)
    }

    /// Look up the course and check that `lesson_id` is one of its lessons.
    ///
    /// Progress and XP only ever accrue for catalogued lessons.
    async fn catalog_lesson(&self, lesson_id: &str, course_id: &str) -> Result<()> {
        let course = self
            .gateway
            .bounded(self.gateway.store().get_course(course_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        if !course.has_lesson(lesson_id) {
            tracing::warn!(lesson_id, course_id, "Lesson is not part of the course");
            return Err(AppError::NotFound("Lesson not found in course".to_string()));
        }
        Ok(())
    }

    /// Number of completed lessons for (user, course). One document read.
    pub async fn completed_lesson_count(&self, user_id: &str, course_id: &str) -> Result<u32> {
        let progress = self
            .gateway
            .bounded(self.gateway.store().get_course_progress(user_id, course_id))
            .await?;
        Ok(progress.map(|p| p.completed_lessons).unwrap_or(0))
    }

    /// Completed count plus the course size, for progress bars.
    pub async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<CourseProgressSummary> {
        check_id("course_id", course_id)?;

        let completed_lessons = self.completed_lesson_count(user_id, course_id).await?;
        let course = self
            .gateway
            .bounded(self.gateway.store().get_course(course_id))
            .await?;

        let total_lessons = course.map(|c| c.total_lessons());
        Ok(CourseProgressSummary {
            course_id: course_id.to_string(),
            completed_lessons,
            total_lessons,
            is_complete: total_lessons.is_some_and(|t| t > 0 && completed_lessons >= t),
        })
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with: FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test --test firestore_integration
//!
//! Each test uses fresh ids, so runs do not interfere.

use chrono::NaiveDate;
use lms_progress::db::LearningStore;
use lms_progress::models::{
    Certificate, CompletionRequest, Course, CredentialReservation, ProgressStatus, XpEvent,
    XpEventKind,
};
use lms_progress::time_utils::format_utc_rfc3339;

mod common;
use common::{test_db, unique_id};

const NUM_CONCURRENT_LESSONS: usize = 8;

fn completion(user_id: &str, lesson_id: &str, course_id: &str) -> CompletionRequest {
    CompletionRequest {
        user_id: user_id.to_string(),
        display_name: "Emulator Learner".to_string(),
        lesson_id: lesson_id.to_string(),
        course_id: course_id.to_string(),
        xp_amount: 50,
        now: format_utc_rfc3339(chrono::Utc::now()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROGRESS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_completion_is_compare_and_set() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    let first = db.complete_lesson(&completion(&user_id, "l1", "c1")).await.unwrap();
    let second = db.complete_lesson(&completion(&user_id, "l1", "c1")).await.unwrap();

    assert!(first.transitioned);
    assert!(!second.transitioned);
    assert_eq!(second.xp_awarded, 0);
    assert_eq!(second.profile.xp, 50);

    let course = db.get_course_progress(&user_id, "c1").await.unwrap().unwrap();
    assert_eq!(course.completed_lessons, 1);
}

#[tokio::test]
async fn test_concurrent_completions_are_serialized() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("racer");

    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_LESSONS {
        let db = test_db().await;
        let request = completion(&user_id, &format!("l{}", i), "c1");
        handles.push(tokio::spawn(async move { db.complete_lesson(&request).await }));
    }
    for handle in handles {
        handle
            .await
            .expect("Task join failed")
            .expect("Completion failed");
    }

    let profile = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(profile.xp, 50 * NUM_CONCURRENT_LESSONS as u64);
    let course = db.get_course_progress(&user_id, "c1").await.unwrap().unwrap();
    assert_eq!(course.completed_lessons, NUM_CONCURRENT_LESSONS as u32);
}

#[tokio::test]
async fn test_position_keeps_completed_status() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let now = format_utc_rfc3339(chrono::Utc::now());

    let started = db
        .record_watch_position(&user_id, "l1", "c1", 12.0, &now)
        .await
        .unwrap();
    assert_eq!(started.status, ProgressStatus::InProgress);

    db.complete_lesson(&completion(&user_id, "l1", "c1")).await.unwrap();
    let after = db
        .record_watch_position(&user_id, "l1", "c1", 3.0, &now)
        .await
        .unwrap();
    assert_eq!(after.status, ProgressStatus::Completed);
    assert_eq!(after.last_position_seconds, 3.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// XP & STREAK TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_award_xp_once_per_event() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let now = format_utc_rfc3339(chrono::Utc::now());
    let event = XpEvent::new(&user_id, XpEventKind::CourseCompleted, "c1", 200, &now);

    assert!(db.award_xp(&event).await.unwrap().is_some());
    assert!(db.award_xp(&event).await.unwrap().is_none());

    let recent = db.xp_events_since(&now).await.unwrap();
    assert_eq!(recent.iter().filter(|e| e.user_id == user_id).count(), 1);
}

#[tokio::test]
async fn test_streak_touch() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

    assert_eq!(db.touch_streak(&user_id, day("2024-01-01")).await.unwrap().current_streak, 1);
    assert_eq!(db.touch_streak(&user_id, day("2024-01-02")).await.unwrap().current_streak, 2);
    assert_eq!(db.touch_streak(&user_id, day("2024-01-02")).await.unwrap().current_streak, 2);
    assert_eq!(db.touch_streak(&user_id, day("2024-01-05")).await.unwrap().current_streak, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CERTIFICATE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_certificate_insert_is_unique() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let course_id = unique_id("course");
    db.upsert_course(&Course {
        course_id: course_id.clone(),
        title: "Emulated".to_string(),
        lesson_ids: vec!["l1".to_string()],
    })
    .await
    .unwrap();

    let now = format_utc_rfc3339(chrono::Utc::now());
    let make = |credential_id: &str| Certificate {
        credential_id: credential_id.to_string(),
        user_id: user_id.clone(),
        course_id: course_id.clone(),
        issued_at: now.clone(),
    };
    let first_id = unique_id("CERT");
    let second_id = unique_id("CERT");

    for id in [&first_id, &second_id] {
        assert!(db
            .reserve_credential(&CredentialReservation {
                credential_id: id.clone(),
                user_id: user_id.clone(),
                course_id: course_id.clone(),
                reserved_at: now.clone(),
            })
            .await
            .unwrap());
    }

    let first = db.insert_certificate(&make(&first_id)).await.unwrap();
    let second = db.insert_certificate(&make(&second_id)).await.unwrap();

    assert!(first.was_inserted());
    assert!(!second.was_inserted());
    assert_eq!(second.into_inner().credential_id, first_id);

    // The losing reservation does not resolve to a certificate
    assert!(db
        .get_certificate_by_credential(&second_id)
        .await
        .unwrap()
        .is_none());
    assert!(db
        .get_certificate_by_credential(&first_id)
        .await
        .unwrap()
        .is_some());
}

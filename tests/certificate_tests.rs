// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Certificate issuance and public verification.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use lms_progress::db::LearningStore;
use lms_progress::error::AppError;
use lms_progress::models::Profile;
use std::collections::HashSet;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, seed_course};

const NUM_CONCURRENT_ISSUERS: usize = 16;

async fn complete_course(state: &lms_progress::AppState, user_id: &str, course_id: &str, lessons: u32) {
    for i in 0..lessons {
        state
            .progress
            .complete_lesson(user_id, "Grace Hopper", &format!("lesson-{}", i), course_id)
            .await
            .expect("Completion failed");
    }
}

#[tokio::test]
async fn test_not_eligible_until_all_lessons_done() {
    let (_app, state, store) = create_test_app();
    seed_course(store.as_ref(), "c1", 3).await;
    complete_course(&state, "u1", "c1", 2).await;

    let issued = state.certificates.issue_if_eligible("u1", "c1").await.unwrap();

    assert!(issued.is_none());
    assert_eq!(store.certificate_count().await, 0);
}

#[tokio::test]
async fn test_unknown_course_is_not_eligible() {
    let (_app, state, _store) = create_test_app();
    let issued = state
        .certificates
        .issue_if_eligible("u1", "no-such-course")
        .await
        .unwrap();
    assert!(issued.is_none());
}

#[tokio::test]
async fn test_concurrent_issuance_yields_one_certificate() {
    let (_app, state, store) = create_test_app();
    seed_course(store.as_ref(), "c1", 2).await;
    complete_course(&state, "u1", "c1", 2).await;

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_ISSUERS {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.certificates.issue_if_eligible("u1", "c1").await
        }));
    }

    let mut credential_ids = HashSet::new();
    let mut newly_issued = 0;
    for handle in handles {
        let issued = handle
            .await
            .expect("Task join failed")
            .expect("Issuance failed")
            .expect("Learner should be eligible");
        if issued.newly_issued {
            newly_issued += 1;
        }
        credential_ids.insert(issued.certificate.credential_id);
    }

    assert_eq!(credential_ids.len(), 1, "All issuers must agree on one credential");
    assert_eq!(newly_issued, 1);
    assert_eq!(store.certificate_count().await, 1);

    // Course bonus granted once on top of 2 × 50 lesson XP
    let profile = store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.xp, 300);
}

#[tokio::test]
async fn test_verify_issued_certificate() {
    let (app, state, store) = create_test_app();
    seed_course(store.as_ref(), "c1", 1).await;
    complete_course(&state, "u1", "c1", 1).await;

    let issued = state
        .certificates
        .issue_if_eligible("u1", "c1")
        .await
        .unwrap()
        .unwrap();
    let credential_id = issued.certificate.credential_id;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/certificates/{}", credential_id.to_lowercase()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["credential_id"], credential_id.as_str());
    assert_eq!(body["holder_name"], "Grace Hopper");
    assert_eq!(body["course_title"], "Course c1");
}

#[tokio::test]
async fn test_verify_holder_name_follows_profile() {
    let (_app, state, store) = create_test_app();
    seed_course(store.as_ref(), "c1", 1).await;
    complete_course(&state, "u1", "c1", 1).await;
    let issued = state
        .certificates
        .issue_if_eligible("u1", "c1")
        .await
        .unwrap()
        .unwrap();

    let mut profile: Profile = store.get_profile("u1").await.unwrap().unwrap();
    profile.display_name = "Rear Admiral Hopper".to_string();
    store.upsert_profile(&profile).await.unwrap();

    let view = state
        .certificates
        .verify(&issued.certificate.credential_id)
        .await
        .unwrap();
    assert_eq!(view.holder_name, "Rear Admiral Hopper");
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_indistinguishable() {
    let (app, _state, _store) = create_test_app();

    let mut bodies = vec![];
    for id in ["CERT-DOES-NOT-EXIST", "CERT-ZZZZ-ZZZZ", "garbage"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/certificates/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        bodies.push(body_json(response).await);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
}

#[tokio::test]
async fn test_verify_service_returns_not_found() {
    let (_app, state, _store) = create_test_app();
    let err = state
        .certificates
        .verify("CERT-DOES-NOT-EXIST")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

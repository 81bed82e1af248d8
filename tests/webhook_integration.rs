// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for billing webhook handling.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use lms_progress::db::LearningStore;
use lms_progress::models::{Profile, SubscriptionStatus};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

mod common;
use common::create_test_app;

/// Sign a delivery the way the billing provider does.
fn signed_request(secret: &str, msg_id: &str, timestamp: i64, body: &str) -> Request<Body> {
    let key = STANDARD
        .decode(secret.trim_start_matches("whsec_"))
        .unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    mac.update(format!("{}.{}.{}", msg_id, timestamp, body).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Request::builder()
        .method("POST")
        .uri("/webhooks/billing")
        .header("content-type", "application/json")
        .header("webhook-id", msg_id)
        .header("webhook-timestamp", timestamp.to_string())
        .header("webhook-signature", format!("v1,{}", signature))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn cancel_event(user_id: &str) -> String {
    json!({
        "type": "subscription.canceled",
        "data": { "id": "sub_123", "metadata": { "user_id": user_id } }
    })
    .to_string()
}

#[tokio::test]
async fn test_signed_cancellation_updates_profile() {
    let (app, state, store) = create_test_app();
    let mut profile = Profile::new("subscriber", "Sub Scriber", "2024-01-01T00:00:00Z");
    profile.subscription_status = SubscriptionStatus::Active;
    store.upsert_profile(&profile).await.unwrap();

    let response = app
        .oneshot(signed_request(
            &state.config.billing_webhook_secret,
            "msg_1",
            chrono::Utc::now().timestamp(),
            &cancel_event("subscriber"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let profile = store.get_profile("subscriber").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let (app, state, store) = create_test_app();
    store
        .upsert_profile(&Profile::new("subscriber", "S", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(signed_request(
                &state.config.billing_webhook_secret,
                "msg_1",
                chrono::Utc::now().timestamp(),
                &cancel_event("subscriber"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let profile = store.get_profile("subscriber").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn test_bad_signature_rejected() {
    let (app, _state, store) = create_test_app();
    store
        .upsert_profile(&Profile::new("subscriber", "S", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    // base64("not-the-real-secret")
    let response = app
        .oneshot(signed_request(
            "whsec_bm90LXRoZS1yZWFsLXNlY3JldA==",
            "msg_1",
            chrono::Utc::now().timestamp(),
            &cancel_event("subscriber"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let profile = store.get_profile("subscriber").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::None);
}

#[tokio::test]
async fn test_stale_delivery_rejected() {
    let (app, state, _store) = create_test_app();

    let response = app
        .oneshot(signed_request(
            &state.config.billing_webhook_secret,
            "msg_1",
            chrono::Utc::now().timestamp() - 3600,
            &cancel_event("subscriber"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_headers_rejected() {
    let (app, _state, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/billing")
                .body(Body::from(cancel_event("subscriber")))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unrelated_events_acknowledged() {
    let (app, state, _store) = create_test_app();
    let body = json!({"type": "order.paid", "data": {}}).to_string();

    let response = app
        .oneshot(signed_request(
            &state.config.billing_webhook_secret,
            "msg_2",
            chrono::Utc::now().timestamp(),
            &body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_activation_marks_subscription_active() {
    let (app, state, store) = create_test_app();
    store
        .upsert_profile(&Profile::new("subscriber", "S", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();
    let body = json!({
        "type": "subscription.active",
        "data": { "id": "sub_123", "metadata": { "user_id": "subscriber" } }
    })
    .to_string();

    let response = app
        .oneshot(signed_request(
            &state.config.billing_webhook_secret,
            "msg_3",
            chrono::Utc::now().timestamp(),
            &body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let profile = store.get_profile("subscriber").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn test_extreme_timestamp_rejected() {
    let (app, state, _store) = create_test_app();

    let mut request = signed_request(
        &state.config.billing_webhook_secret,
        "msg_4",
        0,
        &cancel_event("subscriber"),
    );
    request.headers_mut().insert(
        "webhook-timestamp",
        "-9223372036854775808".parse().unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

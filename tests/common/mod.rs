// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use lms_progress::config::Config;
use lms_progress::db::{FirestoreStore, LearningStore, MemoryStore};
use lms_progress::models::Course;
use lms_progress::routes::create_router;
use lms_progress::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config with the leaderboard cache disabled so reads see fresh data.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        leaderboard_cache_ttl: Duration::ZERO,
        ..Config::default()
    }
}

/// Create a test app over a fresh in-memory store.
/// Returns the router, the shared state, and the store for seeding and
/// fault injection.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    create_test_app_with(test_config())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config, store.clone()));
    (create_router(state.clone()), state, store)
}

/// Add a course to the catalog with lessons `lesson-0` .. `lesson-{n-1}`.
#[allow(dead_code)]
pub async fn seed_course(store: &dyn LearningStore, course_id: &str, total_lessons: u32) {
    store
        .upsert_course(&Course {
            course_id: course_id.to_string(),
            title: format!("Course {}", course_id),
            lesson_ids: (0..total_lessons).map(|i| format!("lesson-{}", i)).collect(),
        })
        .await
        .expect("Failed to seed course");
}

/// Create a session JWT (mirrors what the identity service issues).
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    lms_progress::middleware::auth::create_jwt(user_id, "Test Learner", signing_key)
        .expect("Failed to create JWT")
}

/// Build an authenticated JSON POST.
#[allow(dead_code)]
pub fn authed_post(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build an authenticated GET.
#[allow(dead_code)]
pub fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Unique id per call, for emulator test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

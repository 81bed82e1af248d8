// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment, or read
//! from a local `.env` file during development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which `LearningStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store; state is lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Deadline for every store call
    pub store_timeout: Duration,
    /// Leaderboard cache lifetime; zero disables caching
    pub leaderboard_cache_ttl: Duration,
    /// XP per completed lesson
    pub lesson_xp: u64,
    /// Bonus XP when a course certificate is issued
    pub course_completion_xp: u64,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Billing webhook secret (`whsec_...`)
    pub billing_webhook_secret: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_millis(5000),
            leaderboard_cache_ttl: Duration::from_secs(60),
            lesson_xp: 50,
            course_completion_xp: 200,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            // base64("test-webhook-secret-key")
            billing_webhook_secret: "whsec_dGVzdC13ZWJob29rLXNlY3JldC1rZXk=".to_string(),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` if unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::Firestore,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend,
            store_timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 5000)?),
            leaderboard_cache_ttl: Duration::from_secs(parse_var(
                "LEADERBOARD_CACHE_TTL_SECS",
                60,
            )?),
            lesson_xp: parse_var("LESSON_XP", 50)?,
            course_completion_xp: parse_var("COURSE_COMPLETION_XP", 200)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            billing_webhook_secret: env::var("BILLING_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BILLING_WEBHOOK_SECRET"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

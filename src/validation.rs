// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Input checks applied by services before any storage call.
//!
//! Request bodies get coarse `validator` rules; these are the
//! authoritative checks.

use crate::error::{AppError, Result};

/// Longest id accepted for users, lessons and courses.
pub const MAX_ID_LEN: usize = 128;

/// Longest lesson position accepted (24 hours).
pub const MAX_POSITION_SECONDS: f64 = 86_400.0;

fn id_is_valid(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Reject a malformed id before it reaches storage.
pub fn check_id(field: &str, value: &str) -> Result<()> {
    if id_is_valid(value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be 1-{} characters of [A-Za-z0-9._-]",
            field, MAX_ID_LEN
        )))
    }
}

/// Reject negative, non-finite, or absurd watch positions.
pub fn check_position(seconds: f64) -> Result<()> {
    if seconds.is_finite() && (0.0..=MAX_POSITION_SECONDS).contains(&seconds) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "seconds must be between 0 and {}",
            MAX_POSITION_SECONDS
        )))
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing provider webhooks (Standard Webhooks signing scheme).
//!
//! The provider signs `"{webhook-id}.{webhook-timestamp}.{body}"` with
//! HMAC-SHA256, keyed by the base64 payload of a `whsec_` secret, and sends
//! one or more `v1,<base64 signature>` entries separated by spaces.

use crate::db::Gateway;
use crate::error::Result;
use crate::models::SubscriptionStatus;
use crate::time_utils::format_utc_rfc3339;
use crate::validation::check_id;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";

/// Accepted clock skew between the provider and us.
pub const TIMESTAMP_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Webhook secret is not configured correctly")]
    BadSecret,
    #[error("Missing or malformed webhook timestamp")]
    BadTimestamp,
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("No matching webhook signature")]
    SignatureMismatch,
}

/// Check a delivery's signature headers against `secret`.
///
/// `now_unix` is the receiver's clock in seconds since the epoch.
pub fn verify_signature(
    secret: &str,
    msg_id: &str,
    timestamp: &str,
    body: &[u8],
    signature_header: &str,
    now_unix: i64,
) -> std::result::Result<(), WebhookError> {
    let key = STANDARD
        .decode(secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret))
        .map_err(|_| WebhookError::BadSecret)?;

    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| WebhookError::BadTimestamp)?;
    if now_unix.abs_diff(sent_at) > TIMESTAMP_TOLERANCE_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| WebhookError::BadSecret)?;
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    let matched = signature_header
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .filter_map(|sig| STANDARD.decode(sig).ok())
        .any(|sig| bool::from(sig.as_slice().ct_eq(expected.as_slice())));

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Billing event envelope. Only the fields we act on.
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: BillingEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillingEventData {
    #[serde(default)]
    pub metadata: BillingMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillingMetadata {
    pub user_id: Option<String>,
}

/// What a verified event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingOutcome {
    SubscriptionUpdated {
        user_id: String,
        status: SubscriptionStatus,
    },
    /// Subscription event for a user we have no profile for
    UnknownUser,
    Ignored,
}

/// Subscription status a provider event moves the profile to, if any.
fn status_for_event(event_type: &str) -> Option<SubscriptionStatus> {
    match event_type {
        "subscription.active" | "subscription.uncanceled" => Some(SubscriptionStatus::Active),
        "subscription.canceled" | "subscription.revoked" => Some(SubscriptionStatus::Canceled),
        _ => None,
    }
}

#[derive(Clone)]
pub struct BillingService {
    gateway: Gateway,
}

impl BillingService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Apply a verified billing event.
    pub async fn handle_event(&self, event: &BillingEvent) -> Result<BillingOutcome> {
        let Some(status) = status_for_event(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "Ignoring billing event");
            return Ok(BillingOutcome::Ignored);
        };

        let Some(user_id) = event.data.metadata.user_id.as_deref() else {
            tracing::warn!(event_type = %event.event_type, "Billing event without user_id metadata");
            return Ok(BillingOutcome::Ignored);
        };
        if check_id("user_id", user_id).is_err() {
            tracing::warn!(event_type = %event.event_type, "Billing event with malformed user_id");
            return Ok(BillingOutcome::Ignored);
        }

        let now = format_utc_rfc3339(chrono::Utc::now());
        let updated = self
            .gateway
            .bounded(
                self.gateway
                    .store()
                    .set_subscription_status(user_id, status, &now),
            )
            .await?;

        match updated {
            Some(_) => {
                tracing::info!(user_id, event_type = %event.event_type, ?status, "Subscription status updated");
                Ok(BillingOutcome::SubscriptionUpdated {
                    user_id: user_id.to_string(),
                    status,
                })
            }
            None => {
                tracing::warn!(user_id, "Subscription event for unknown profile");
                Ok(BillingOutcome::UnknownUser)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64("test-webhook-secret-key")
    const SECRET: &str = "whsec_dGVzdC13ZWJob29rLXNlY3JldC1rZXk=";

    fn sign(id: &str, ts: &str, body: &[u8]) -> String {
        let key = STANDARD.decode(&SECRET[SECRET_PREFIX.len()..]).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{}.{}.", id, ts).as_bytes());
        mac.update(body);
        format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"type":"subscription.canceled"}"#;
        let sig = sign("msg_1", "1700000000", body);
        assert_eq!(
            verify_signature(SECRET, "msg_1", "1700000000", body, &sig, 1700000010),
            Ok(())
        );
    }

    #[test]
    fn test_any_listed_signature_may_match() {
        let body = b"{}";
        let sig = format!("v1,AAAA {}", sign("msg_1", "1700000000", body));
        assert!(verify_signature(SECRET, "msg_1", "1700000000", body, &sig, 1700000000).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign("msg_1", "1700000000", b"{}");
        assert_eq!(
            verify_signature(SECRET, "msg_1", "1700000000", b"{ }", &sig, 1700000000),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let sig = sign("msg_1", "1700000000", b"{}");
        assert_eq!(
            verify_signature(SECRET, "msg_1", "1700000000", b"{}", &sig, 1700000301),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale_not_overflow() {
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            assert_eq!(
                verify_signature(SECRET, "msg_1", ts, b"{}", "v1,AAAA", 1_700_000_000),
                Err(WebhookError::StaleTimestamp)
            );
        }
        assert_eq!(
            verify_signature(SECRET, "msg_1", "0", b"{}", "v1,AAAA", i64::MIN),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        assert_eq!(
            verify_signature(SECRET, "msg_1", "yesterday", b"{}", "v1,AAAA", 0),
            Err(WebhookError::BadTimestamp)
        );
    }

    #[test]
    fn test_event_types_map_to_status() {
        assert_eq!(
            status_for_event("subscription.active"),
            Some(SubscriptionStatus::Active)
        );
        assert_eq!(
            status_for_event("subscription.revoked"),
            Some(SubscriptionStatus::Canceled)
        );
        assert_eq!(status_for_event("order.paid"), None);
    }

    #[tokio::test]
    async fn test_malformed_user_id_is_ignored() {
        let store = std::sync::Arc::new(crate::db::memory::MemoryStore::new());
        let service = BillingService::new(Gateway::new(store, std::time::Duration::from_secs(1)));
        let event: BillingEvent = serde_json::from_str(
            r#"{"type":"subscription.canceled","data":{"metadata":{"user_id":"users/../admin"}}}"#,
        )
        .unwrap();

        assert_eq!(service.handle_event(&event).await.unwrap(), BillingOutcome::Ignored);
    }

    #[test]
    fn test_event_parsing_tolerates_missing_metadata() {
        let event: BillingEvent = serde_json::from_str(r#"{"type":"order.paid"}"#).unwrap();
        assert_eq!(event.event_type, "order.paid");
        assert!(event.data.metadata.user_id.is_none());
    }
}

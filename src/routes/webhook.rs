// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for billing provider events.

use crate::error::AppError;
use crate::services::billing::{verify_signature, BillingEvent};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/billing", post(handle_billing_event))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handle a signed billing event (POST).
///
/// Storage errors propagate as 503/504 so the provider redelivers; the
/// handler is idempotent.
async fn handle_billing_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let (Some(msg_id), Some(timestamp), Some(signature)) = (
        header_str(&headers, "webhook-id"),
        header_str(&headers, "webhook-timestamp"),
        header_str(&headers, "webhook-signature"),
    ) else {
        tracing::warn!("Billing webhook missing signature headers");
        return Err(AppError::Unauthorized);
    };

    if let Err(e) = verify_signature(
        &state.config.billing_webhook_secret,
        msg_id,
        timestamp,
        &body,
        signature,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(
            webhook_id = msg_id,
            error = %e,
            "Security Alert: Billing webhook signature rejected"
        );
        return Err(AppError::Unauthorized);
    }

    let event: BillingEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(webhook_id = msg_id, error = %e, "Failed to parse billing event");
        AppError::Validation("Malformed billing event".to_string())
    })?;

    tracing::info!(
        webhook_id = msg_id,
        event_type = %event.event_type,
        "Billing event received"
    );

    state.billing.handle_event(&event).await?;

    Ok(StatusCode::OK)
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course certificates and public credential verification.
//!
//! Issuance is insert-or-fetch: a fresh credential id is reserved in the
//! `credentials` index, then the certificate is inserted under the
//! (user, course) slot. If the slot is already taken the existing
//! certificate wins and the reservation is released, so concurrent
//! issuers all return the same credential id.

use crate::db::Gateway;
use crate::error::{AppError, Result};
use crate::models::{
    Certificate, CredentialReservation, InsertOutcome, Notification, Profile, XpEventKind,
};
use crate::services::xp::{Award, XpLedger};
use crate::time_utils::format_utc_rfc3339;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Crockford base32 alphabet (no I, L, O, U).
const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const CREDENTIAL_PREFIX: &str = "CERT-";
const GROUP_LEN: usize = 4;

/// Reservation attempts before giving up on finding a free credential id.
const MAX_CREDENTIAL_ATTEMPTS: usize = 5;

/// Generate a credential id like `CERT-7K2M-Q9XD` (40 random bits).
pub fn generate_credential_id(rng: &SystemRandom) -> Result<String> {
    let mut bytes = [0u8; GROUP_LEN * 2];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

    // 256 is a multiple of 32, so masking keeps symbols uniform.
    let symbols: String = bytes
        .iter()
        .map(|b| CROCKFORD[(b & 0x1f) as usize] as char)
        .collect();

    Ok(format!(
        "{}{}-{}",
        CREDENTIAL_PREFIX,
        &symbols[..GROUP_LEN],
        &symbols[GROUP_LEN..]
    ))
}

/// Canonical form of a credential id typed by a human, or `None` if it
/// cannot be one of ours.
///
/// Case-insensitive; `O` reads as `0` and `I`/`L` as `1`.
pub fn normalize_credential_id(input: &str) -> Option<String> {
    let upper = input.trim().to_ascii_uppercase();
    let body = upper.strip_prefix(CREDENTIAL_PREFIX)?;
    let (first, second) = body.split_once('-')?;
    if first.len() != GROUP_LEN || second.len() != GROUP_LEN {
        return None;
    }

    let normalize_group = |group: &str| -> Option<String> {
        group
            .chars()
            .map(|c| match c {
                'O' => Some('0'),
                'I' | 'L' => Some('1'),
                c if c.is_ascii() && CROCKFORD.contains(&(c as u8)) => Some(c),
                _ => None,
            })
            .collect()
    };

    Some(format!(
        "{}{}-{}",
        CREDENTIAL_PREFIX,
        normalize_group(first)?,
        normalize_group(second)?
    ))
}

/// Public verification payload.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CertificateView {
    pub credential_id: String,
    pub holder_name: String,
    pub course_id: String,
    pub course_title: String,
    pub issued_at: String,
}

/// Result of a successful `issue_if_eligible`.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    /// False when the certificate already existed
    pub newly_issued: bool,
    /// Profile after the course completion bonus, if this call granted it
    pub bonus_profile: Option<Profile>,
    /// Bonus XP granted by this call
    pub bonus_xp: u64,
}

#[derive(Clone)]
pub struct CertificateIssuer {
    gateway: Gateway,
    xp: XpLedger,
    course_completion_xp: u64,
    rng: SystemRandom,
}

impl CertificateIssuer {
    pub fn new(gateway: Gateway, xp: XpLedger, course_completion_xp: u64) -> Self {
        Self {
            gateway,
            xp,
            course_completion_xp,
            rng: SystemRandom::new(),
        }
    }

    /// Issue the course certificate if every lesson is completed.
    ///
    /// Returns `None` when the learner is not eligible (or the course is
    /// unknown). Safe to call any number of times, concurrently: exactly
    /// one certificate exists per (user, course).
    pub async fn issue_if_eligible(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<IssuedCertificate>> {
        let store = self.gateway.store();

        if let Some(existing) = self
            .gateway
            .bounded(store.get_certificate(user_id, course_id))
            .await?
        {
            return self.finish(existing, false).await.map(Some);
        }

        let Some(course) = self.gateway.bounded(store.get_course(course_id)).await? else {
            tracing::debug!(user_id, course_id, "Unknown course, no certificate");
            return Ok(None);
        };
        if course.total_lessons() == 0 {
            return Ok(None);
        }

        let completed = self
            .gateway
            .bounded(store.get_course_progress(user_id, course_id))
            .await?
            .map(|p| p.completed_lessons)
            .unwrap_or(0);
        if completed < course.total_lessons() {
            return Ok(None);
        }

        let now = format_utc_rfc3339(chrono::Utc::now());
        let credential_id = self.reserve_credential(user_id, course_id, &now).await?;

        let candidate = Certificate {
            credential_id: credential_id.clone(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            issued_at: now,
        };

        match self
            .gateway
            .bounded(store.insert_certificate(&candidate))
            .await?
        {
            InsertOutcome::Inserted(certificate) => {
                tracing::info!(
                    user_id,
                    course_id,
                    credential_id = %certificate.credential_id,
                    "Certificate issued"
                );
                self.finish(certificate, true).await.map(Some)
            }
            InsertOutcome::Existing(certificate) => {
                tracing::debug!(
                    user_id,
                    course_id,
                    "Certificate already issued by a concurrent request"
                );
                if let Err(e) = self
                    .gateway
                    .bounded(store.release_credential(&credential_id))
                    .await
                {
                    // An orphan reservation never resolves to a certificate.
                    tracing::warn!(credential_id = %credential_id, error = %e, "Failed to release credential reservation");
                }
                self.finish(certificate, false).await.map(Some)
            }
        }
    }

    async fn reserve_credential(&self, user_id: &str, course_id: &str, now: &str) -> Result<String> {
        for attempt in 1..=MAX_CREDENTIAL_ATTEMPTS {
            let reservation = CredentialReservation {
                credential_id: generate_credential_id(&self.rng)?,
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                reserved_at: now.to_string(),
            };

            if self
                .gateway
                .bounded(self.gateway.store().reserve_credential(&reservation))
                .await?
            {
                return Ok(reservation.credential_id);
            }

            tracing::warn!(attempt, "Credential id collision, regenerating");
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "No free credential id after {} attempts",
            MAX_CREDENTIAL_ATTEMPTS
        )))
    }

    /// Grant the course bonus and notify. Both steps are keyed by the
    /// certificate, so rerunning them after a partial failure is harmless.
    async fn finish(&self, certificate: Certificate, newly_issued: bool) -> Result<IssuedCertificate> {
        let award = self
            .xp
            .award_xp(
                &certificate.user_id,
                XpEventKind::CourseCompleted,
                &certificate.course_id,
                self.course_completion_xp,
            )
            .await?;

        let bonus_profile = match award {
            Award::Granted(profile) => {
                let title = self
                    .gateway
                    .bounded(self.gateway.store().get_course(&certificate.course_id))
                    .await?
                    .map(|c| c.title)
                    .unwrap_or_else(|| certificate.course_id.clone());
                let notification = Notification::certificate_issued(
                    &certificate.user_id,
                    &title,
                    &certificate.credential_id,
                    &format_utc_rfc3339(chrono::Utc::now()),
                );
                self.gateway
                    .bounded(self.gateway.store().publish_notification(&notification))
                    .await?;
                Some(profile)
            }
            Award::AlreadyAwarded => None,
        };

        let bonus_xp = if bonus_profile.is_some() {
            self.course_completion_xp
        } else {
            0
        };

        Ok(IssuedCertificate {
            certificate,
            newly_issued,
            bonus_profile,
            bonus_xp,
        })
    }

    /// Public lookup by credential id.
    ///
    /// Unknown and malformed ids fail the same way so the endpoint does not
    /// reveal which ids are well-formed.
    pub async fn verify(&self, credential_id: &str) -> Result<CertificateView> {
        let not_found = || AppError::NotFound("Certificate not found".to_string());

        let Some(credential_id) = normalize_credential_id(credential_id) else {
            return Err(not_found());
        };

        let store = self.gateway.store();
        let certificate = self
            .gateway
            .bounded(store.get_certificate_by_credential(&credential_id))
            .await?
            .ok_or_else(not_found)?;

        let course = self
            .gateway
            .bounded(store.get_course(&certificate.course_id))
            .await?;
        let profile = self
            .gateway
            .bounded(store.get_profile(&certificate.user_id))
            .await?;

        Ok(CertificateView {
            credential_id: certificate.credential_id,
            holder_name: profile
                .map(|p| p.display_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Anonymous learner".to_string()),
            course_title: course
                .map(|c| c.title)
                .unwrap_or_else(|| certificate.course_id.clone()),
            course_id: certificate.course_id,
            issued_at: certificate.issued_at,
        })
    }
}

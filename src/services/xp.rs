// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP accrual and the level step function.
//!
//! Reaching level `L` requires `50 * L * (L - 1)` cumulative XP:
//!
//! | level | XP    |
//! |-------|-------|
//! | 1     | 0     |
//! | 2     | 100   |
//! | 3     | 300   |
//! | 4     | 600   |
//! | 5     | 1000  |
//!
//! Level is always derived from XP and never set on its own.

use crate::db::Gateway;
use crate::error::Result;
use crate::models::{Profile, XpEvent, XpEventKind};
use crate::time_utils::format_utc_rfc3339;

const XP_STEP: u64 = 50;

/// Cumulative XP needed to reach `level` (levels start at 1).
pub fn xp_for_level(level: u32) -> u64 {
    let level = u64::from(level.max(1));
    XP_STEP.saturating_mul(level).saturating_mul(level - 1)
}

/// Level reached with `xp` cumulative XP.
pub fn level_for_xp(xp: u64) -> u32 {
    // Solve 50·L·(L−1) <= xp for the largest L, then correct rounding.
    let estimate = ((1.0 + (1.0 + 4.0 * xp as f64 / XP_STEP as f64).sqrt()) / 2.0) as u32;
    let mut level = estimate.max(1);
    while level > 1 && xp_for_level(level) > xp {
        level -= 1;
    }
    while xp_for_level(level + 1) <= xp {
        level += 1;
    }
    level
}

/// XP still missing before the next level.
pub fn xp_to_next_level(xp: u64) -> u64 {
    xp_for_level(level_for_xp(xp) + 1).saturating_sub(xp)
}

/// Outcome of an award request.
#[derive(Debug, Clone)]
pub enum Award {
    /// XP was added; carries the updated profile
    Granted(Profile),
    /// The same event was awarded before; nothing changed
    AlreadyAwarded,
}

/// Grants XP for qualifying events.
#[derive(Clone)]
pub struct XpLedger {
    gateway: Gateway,
}

impl XpLedger {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Award `amount` XP for `kind` on `subject_id` (a lesson or course id).
    ///
    /// At most once per (user, kind, subject): a repeated or retried call
    /// returns `Award::AlreadyAwarded`, so this is safe to retry after a
    /// timeout.
    pub async fn award_xp(
        &self,
        user_id: &str,
        kind: XpEventKind,
        subject_id: &str,
        amount: u64,
    ) -> Result<Award> {
        let now = format_utc_rfc3339(chrono::Utc::now());
        let event = XpEvent::new(user_id, kind, subject_id, amount, &now);

        let updated = self
            .gateway
            .bounded(self.gateway.store().award_xp(&event))
            .await?;

        match updated {
            Some(profile) => {
                tracing::info!(
                    user_id,
                    kind = kind.as_str(),
                    subject_id,
                    amount,
                    total_xp = profile.xp,
                    level = profile.level,
                    "XP awarded"
                );
                Ok(Award::Granted(profile))
            }
            None => {
                tracing::debug!(
                    user_id,
                    event_key = %event.event_key,
                    "XP already awarded for event (idempotent skip)"
                );
                Ok(Award::AlreadyAwarded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(299), 2);
        assert_eq!(level_for_xp(300), 3);
        assert_eq!(level_for_xp(600), 4);
        assert_eq!(level_for_xp(1000), 5);
    }

    #[test]
    fn test_xp_for_level_table() {
        assert_eq!(xp_for_level(1), 0);
        assert_eq!(xp_for_level(2), 100);
        assert_eq!(xp_for_level(5), 1000);
        assert_eq!(xp_for_level(0), 0);
    }

    #[test]
    fn test_xp_to_next_level() {
        assert_eq!(xp_to_next_level(0), 100);
        assert_eq!(xp_to_next_level(250), 50);
        assert_eq!(xp_to_next_level(300), 300);
    }

    proptest! {
        #[test]
        fn prop_level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for_xp(lo) <= level_for_xp(hi));
        }

        #[test]
        fn prop_level_brackets_xp(xp in 0u64..10_000_000) {
            let level = level_for_xp(xp);
            prop_assert!(xp_for_level(level) <= xp);
            prop_assert!(xp < xp_for_level(level + 1));
        }
    }
}

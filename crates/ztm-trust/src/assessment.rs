// SPDX-License-Identifier: BUSL-1.1
//! # Trust Assessments
//!
//! The versioned output of one trust evaluation. Assessments are
//! replaced wholesale on each re-evaluation; the stored version only
//! ever increases per principal.

use serde::{Deserialize, Serialize};

use ztm_core::{PrincipalId, Timestamp, TrustLevel};
use ztm_monitor::Maturity;

/// One principal's current trust evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    pub principal_id: PrincipalId,
    /// The level as committed. Readers should go through
    /// [`TrustAssessment::effective_level`], which applies decay.
    pub level: TrustLevel,
    /// 1.0 if chain verification passed, 0.0 otherwise.
    pub identity_score: f64,
    /// Behavioral anomaly score in `[0, 1]` at evaluation time.
    pub anomaly_score: f64,
    /// Configuration-defined context weight in `[0, 1]`.
    pub context_score: f64,
    /// The weighted composite the level was mapped from.
    pub composite_score: f64,
    /// Baseline maturity at evaluation time.
    pub maturity: Maturity,
    /// Monotonically increasing per principal.
    pub version: u64,
    /// Consecutive evaluations the composite has held above the next
    /// band's threshold; promotion dwell bookkeeping.
    pub promotion_streak: u32,
    pub computed_at: Timestamp,
    /// After this instant the level starts decaying.
    pub expires_at: Timestamp,
}

impl TrustAssessment {
    /// The level with the aging policy applied: one band lost per
    /// re-evaluation cycle that has fully elapsed past `expires_at`.
    ///
    /// A fresh assessment returns its committed level unchanged. The
    /// level never silently stays elevated without fresh evidence.
    pub fn effective_level(&self, now: Timestamp, cycle_secs: i64) -> TrustLevel {
        if !self.expires_at.is_before(now) {
            return self.level;
        }
        let overdue = self.expires_at.secs_until(now);
        let missed_cycles = 1 + (overdue / cycle_secs.max(1))
            .min(i64::from(ztm_core::TrustLevel::BAND_COUNT)) as u32;
        self.level.demoted_by(missed_cycles)
    }

    /// Whether the assessment is past its expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_before(now)
    }
}

// SPDX-License-Identifier: BUSL-1.1
//! # Trust Levels — Ordered Six-Band Classification
//!
//! Defines [`TrustLevel`], the discrete ordered classification of a
//! principal's current trustworthiness. The total order drives every policy
//! gate in the engine: a zone admits a principal only when
//! `level >= zone.min_trust_for_entry`.
//!
//! ## Security Invariant
//!
//! `Untrusted` is absorbing for identity failure: whenever a principal's
//! active certificate is missing, expired, or revoked, its effective level
//! is `Untrusted` regardless of behavioral evidence. That short-circuit is
//! enforced by the trust scorer; this module only supplies the ordering and
//! the band arithmetic (demotion one step at a time for decay).

use serde::{Deserialize, Serialize};

/// Discrete trust classification, ordered from least to most trusted.
///
/// ```text
/// Untrusted(0) < Low(1) < Basic(2) < Elevated(3) < High(4) < Full(5)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TrustLevel {
    /// No trust. Identity unverified or explicitly invalidated.
    Untrusted = 0,
    /// Minimal trust. Identity verified but behavior poorly evidenced.
    Low = 1,
    /// Baseline operational trust.
    Basic = 2,
    /// Elevated trust for sensitive zones.
    Elevated = 3,
    /// High trust, sustained good behavior.
    High = 4,
    /// Full trust. Requires a mature baseline and sustained evidence.
    Full = 5,
}

impl TrustLevel {
    /// Total number of trust bands.
    pub const BAND_COUNT: u8 = 6;

    /// The numeric band (0-5).
    pub fn band(&self) -> u8 {
        *self as u8
    }

    /// The next band down, saturating at `Untrusted`.
    ///
    /// Used by assessment decay: one band per missed re-evaluation cycle.
    pub fn demoted(&self) -> TrustLevel {
        match self {
            Self::Untrusted | Self::Low => Self::Untrusted,
            Self::Basic => Self::Low,
            Self::Elevated => Self::Basic,
            Self::High => Self::Elevated,
            Self::Full => Self::High,
        }
    }

    /// Demote by `steps` bands, saturating at `Untrusted`.
    pub fn demoted_by(&self, steps: u32) -> TrustLevel {
        let mut level = *self;
        for _ in 0..steps {
            if level == Self::Untrusted {
                break;
            }
            level = level.demoted();
        }
        level
    }

    /// Build a level from a numeric band, clamping out-of-range values.
    pub fn from_band(band: u8) -> TrustLevel {
        match band {
            0 => Self::Untrusted,
            1 => Self::Low,
            2 => Self::Basic,
            3 => Self::Elevated,
            4 => Self::High,
            _ => Self::Full,
        }
    }

    /// Whether this level satisfies a zone's entry requirement.
    pub fn satisfies(&self, min_required: TrustLevel) -> bool {
        *self >= min_required
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Untrusted => "UNTRUSTED",
            Self::Low => "LOW",
            Self::Basic => "BASIC",
            Self::Elevated => "ELEVATED",
            Self::High => "HIGH",
            Self::Full => "FULL",
        };
        f.write_str(s)
    }
}

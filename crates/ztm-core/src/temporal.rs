// SPDX-License-Identifier: BUSL-1.1
//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp type truncated to seconds
//! precision. Certificate validity windows, assessment expiry, decision
//! TTLs, and the revocation propagation bound all use this type, so
//! timezone ambiguity and sub-second jitter are excluded by construction.
//!
//! ## Security Invariant
//!
//! Validity and expiry comparisons across components must agree on the
//! instant being compared. Non-UTC inputs are **rejected at parse** — there
//! is no silent conversion that could shift a certificate's expiry window.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ZtmError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, rejecting non-UTC offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// **Rejects non-UTC inputs.** Only timestamps with the `Z` suffix are
    /// accepted — even `+00:00`, which is semantically equivalent, is
    /// rejected so that every stored timestamp has a single canonical form.
    pub fn parse(s: &str) -> Result<Self, ZtmError> {
        if !s.ends_with('Z') {
            return Err(ZtmError::Serialization(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ZtmError::Serialization(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ZtmError> {
        let dt = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            ZtmError::Serialization(format!("invalid Unix timestamp: {secs}"))
        })?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This timestamp advanced by `secs` seconds.
    ///
    /// Saturates at the chrono representable range rather than wrapping.
    pub fn plus_secs(&self, secs: i64) -> Timestamp {
        match self.0.checked_add_signed(chrono::Duration::seconds(secs)) {
            Some(dt) => Self(dt),
            None => *self,
        }
    }

    /// Whole seconds from this timestamp until `other`; negative if `other`
    /// is in the past relative to `self`.
    pub fn secs_until(&self, other: Timestamp) -> i64 {
        (other.0 - self.0).num_seconds()
    }

    /// Whether this timestamp is strictly before `other`.
    pub fn is_before(&self, other: Timestamp) -> bool {
        self.0 < other.0
    }

    /// Render as ISO 8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// SPDX-License-Identifier: BUSL-1.1
//! # Policy Decisions
//!
//! The immutable output of one `Evaluate` call. Decisions are created
//! fresh or served from cache, never mutated — only expired.

use serde::{Deserialize, Serialize};

use ztm_core::{PrincipalId, Timestamp, ZoneId};

/// What the enforcement point should do with the traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Allow,
    Deny,
    /// Neither fully trusted nor denied: route through heightened
    /// logging/inspection. Enforcement of the quarantine path is the
    /// network fabric's job; the engine only emits the directive.
    Quarantine,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Quarantine => "QUARANTINE",
        };
        f.write_str(s)
    }
}

/// Why the decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Allow: both the adjacency and threshold gates passed.
    TrustSufficient,
    /// The effective trust level is below the destination's minimum.
    TrustBelowThreshold,
    /// The zone crossing is not a permitted edge (or a zone is unknown).
    ZonePolicyViolation,
    /// The principal's certificate was revoked; terminal.
    CertificateRevoked,
    /// Source baseline is in drift; traffic is quarantined.
    BehaviorDrift,
    /// The assessment predates a known revocation and cannot be trusted.
    StaleAssessment,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TrustSufficient => "TRUST_SUFFICIENT",
            Self::TrustBelowThreshold => "TRUST_BELOW_THRESHOLD",
            Self::ZonePolicyViolation => "ZONE_POLICY_VIOLATION",
            Self::CertificateRevoked => "CERTIFICATE_REVOKED",
            Self::BehaviorDrift => "BEHAVIOR_DRIFT",
            Self::StaleAssessment => "STALE_ASSESSMENT",
        };
        f.write_str(s)
    }
}

/// One evaluated (or cached) decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub source_principal: PrincipalId,
    pub dest_zone: ZoneId,
    pub action: PolicyAction,
    pub reason_code: ReasonCode,
    /// Seconds this decision may be served from cache.
    pub ttl_secs: i64,
    pub decided_at: Timestamp,
}

impl PolicyDecision {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.decided_at.plus_secs(self.ttl_secs).is_before(now)
    }
}

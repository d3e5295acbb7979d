// SPDX-License-Identifier: BUSL-1.1
//! # Certificate Lifecycle State Machine
//!
//! Models the lifecycle of a per-principal certificate. Each serial moves
//! through a strict state machine:
//!
//! ```text
//! Issued ──▶ Active ──▶ Superseded
//!    │          │           │
//!    └──────────┴───────────┴──▶ Revoked (terminal)
//! ```
//!
//! ## Design Decision
//!
//! Rotation does **not** imply revocation. A rotated-out certificate is
//! marked `Superseded`: it fails chain verification like a revoked one,
//! but carries no revocation reason and does not trigger the revocation
//! broadcast path. Revocation is permanent and irreversible per serial;
//! revoking an already-revoked certificate is a no-op success so that
//! replayed revocation messages are harmless.

use serde::{Deserialize, Serialize};

use ztm_core::{CertSerial, PrincipalId, Timestamp};

use crate::error::CaError;

// ─── Lifecycle State ─────────────────────────────────────────────────────

/// The lifecycle state of a certificate serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertState {
    /// Signed by the authority but not yet activated for use.
    Issued,
    /// The principal's current certificate.
    Active,
    /// Rotated out. Fails verification, but not revoked.
    Superseded,
    /// Revoked (terminal). Permanent per serial.
    Revoked,
}

impl CertState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl std::fmt::Display for CertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Issued => "ISSUED",
            Self::Active => "ACTIVE",
            Self::Superseded => "SUPERSEDED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// Why a certificate was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    KeyCompromise,
    CessationOfOperation,
    PrivilegeWithdrawn,
    Unspecified,
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::KeyCompromise => "KEY_COMPROMISE",
            Self::CessationOfOperation => "CESSATION_OF_OPERATION",
            Self::PrivilegeWithdrawn => "PRIVILEGE_WITHDRAWN",
            Self::Unspecified => "UNSPECIFIED",
        };
        f.write_str(s)
    }
}

/// Record of a certificate state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertTransitionRecord {
    pub from_state: CertState,
    pub to_state: CertState,
    pub at: Timestamp,
    pub reason: String,
}

// ─── Certificate ─────────────────────────────────────────────────────────

/// A per-principal certificate with its lifecycle state and transition log.
///
/// The signature covers the to-be-signed encoding ([`Certificate::tbs_bytes`])
/// which excludes mutable lifecycle fields, so state transitions never
/// invalidate the issuer signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub serial: CertSerial,
    /// The principal this certificate is bound to. A certificate belongs
    /// to exactly one principal.
    pub subject: PrincipalId,
    /// Fingerprint of the issuer's verifying key.
    pub issuer: String,
    /// The subject's Ed25519 public key, hex-encoded.
    pub subject_public_key: String,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
    pub state: CertState,
    pub issued_at: Timestamp,
    /// Issuer signature over [`Certificate::tbs_bytes`], hex-encoded.
    pub signature: String,
    /// If revoked, why.
    pub revocation_reason: Option<RevocationReason>,
    /// Ordered log of state transitions.
    pub transitions: Vec<CertTransitionRecord>,
}

/// The fields covered by the issuer signature.
#[derive(Serialize)]
struct TbsCertificate<'a> {
    serial: CertSerial,
    subject: PrincipalId,
    issuer: &'a str,
    subject_public_key: &'a str,
    not_before: Timestamp,
    not_after: Timestamp,
}

impl Certificate {
    /// The canonical to-be-signed encoding.
    ///
    /// Covers identity and validity fields only; lifecycle state and the
    /// transition log are excluded.
    pub fn tbs_bytes(&self) -> Result<Vec<u8>, CaError> {
        let tbs = TbsCertificate {
            serial: self.serial,
            subject: self.subject,
            issuer: &self.issuer,
            subject_public_key: &self.subject_public_key,
            not_before: self.not_before,
            not_after: self.not_after,
        };
        serde_json::to_vec(&tbs).map_err(|e| CaError::Encoding(e.to_string()))
    }

    /// Activate the certificate (ISSUED → ACTIVE).
    pub fn activate(&mut self) -> Result<(), CaError> {
        self.require_state(CertState::Issued, CertState::Active)?;
        self.do_transition(CertState::Active, "activated");
        Ok(())
    }

    /// Mark the certificate superseded by rotation (ACTIVE → SUPERSEDED).
    pub fn supersede(&mut self, new_serial: CertSerial) -> Result<(), CaError> {
        self.require_state(CertState::Active, CertState::Superseded)?;
        self.do_transition(
            CertState::Superseded,
            &format!("rotated to {new_serial}"),
        );
        Ok(())
    }

    /// Revoke the certificate (→ REVOKED, terminal).
    ///
    /// Allowed from any non-terminal state. Revoking an already-revoked
    /// certificate is a no-op success; the return value reports whether
    /// this call performed the revocation (`true`) or found it already
    /// done (`false`).
    pub fn revoke(&mut self, reason: RevocationReason) -> Result<bool, CaError> {
        if self.state == CertState::Revoked {
            return Ok(false);
        }
        self.revocation_reason = Some(reason);
        self.do_transition(CertState::Revoked, &reason.to_string());
        Ok(true)
    }

    /// Whether `at` falls inside the validity window, with `skew_secs` of
    /// clock-skew tolerance on each edge.
    pub fn in_validity_window(&self, at: Timestamp, skew_secs: i64) -> bool {
        !self.is_not_yet_valid(at, skew_secs) && !self.is_expired(at, skew_secs)
    }

    pub fn is_not_yet_valid(&self, at: Timestamp, skew_secs: i64) -> bool {
        at.plus_secs(skew_secs).is_before(self.not_before)
    }

    pub fn is_expired(&self, at: Timestamp, skew_secs: i64) -> bool {
        self.not_after.plus_secs(skew_secs).is_before(at)
    }

    fn require_state(&self, expected: CertState, target: CertState) -> Result<(), CaError> {
        if self.state != expected {
            return Err(CaError::InvalidTransition {
                serial: self.serial,
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: CertState, reason: &str) {
        self.transitions.push(CertTransitionRecord {
            from_state: self.state,
            to_state: to,
            at: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.state = to;
    }
}

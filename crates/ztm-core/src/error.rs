// SPDX-License-Identifier: BUSL-1.1
//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error taxonomy used throughout the ZTM engine. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Certificate errors carry the specific failure (expired, revoked,
//!   unknown issuer) so the policy layer can surface a precise reason code.
//!   They always propagate to a fail-closed deny — never a default allow.
//! - `InsufficientSignal` is non-fatal: the behavioral monitor degrades to
//!   the neutral score and logs a warning.
//! - `PolicyConflict` is fatal at configuration-load time and must never
//!   reach the request path.

use thiserror::Error;

/// Top-level error type for the ZTM engine.
#[derive(Error, Debug)]
pub enum ZtmError {
    /// Presented certificate failed verification (signature or structure).
    #[error("certificate invalid: {0}")]
    CertificateInvalid(String),

    /// Certificate is outside its validity window.
    #[error("certificate expired: serial {serial}, not_after {not_after}")]
    CertificateExpired {
        /// Serial of the expired certificate.
        serial: String,
        /// The expiry instant that has passed.
        not_after: String,
    },

    /// Certificate has been revoked. Revocation is permanent per serial.
    #[error("certificate revoked: serial {serial} ({reason})")]
    CertificateRevoked {
        /// Serial of the revoked certificate.
        serial: String,
        /// Operator-supplied revocation reason.
        reason: String,
    },

    /// The referenced principal is not registered with the engine.
    #[error("identity unknown: {0}")]
    IdentityUnknown(String),

    /// Not enough behavioral evidence to score; non-fatal, yields the
    /// neutral anomaly score.
    #[error("insufficient signal: {0}")]
    InsufficientSignal(String),

    /// The trust state store could not be reached.
    #[error("trust state store unavailable: {0}")]
    StoreUnavailable(String),

    /// Zone table misconfiguration (contradictory or dangling adjacency).
    /// Fatal at load time, never surfaced on the request path.
    #[error("policy conflict: {0}")]
    PolicyConflict(String),

    /// State machine transition rejected.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error (config loading).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for ZtmError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ZtmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

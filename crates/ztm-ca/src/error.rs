// SPDX-License-Identifier: BUSL-1.1
//! Error types for certificate authority operations.

use thiserror::Error;

use ztm_core::CertSerial;

/// Errors from issuance, rotation, revocation, and chain verification.
///
/// The verification variants (`UnknownSerial` through `BadSignature`)
/// double as the fail-closed reasons returned by
/// [`CertificateAuthority::verify_chain`](crate::CertificateAuthority::verify_chain):
/// a chain is valid only when verification returns `Ok`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaError {
    /// Issuance was requested for a principal the authority does not know.
    #[error("identity unknown: {0}")]
    IdentityUnknown(String),

    /// The requested lifecycle transition is not valid from the current state.
    #[error("invalid certificate transition for {serial}: {from} -> {to}")]
    InvalidTransition {
        serial: CertSerial,
        from: String,
        to: String,
    },

    /// The requested validity window is empty or inverted.
    #[error("invalid validity window: {0}")]
    InvalidValidity(String),

    /// No certificate with this serial is registered.
    #[error("unknown certificate serial: {0}")]
    UnknownSerial(CertSerial),

    /// The certificate's validity window has not yet opened, beyond the
    /// configured clock-skew tolerance.
    #[error("certificate {0} is not yet valid")]
    NotYetValid(CertSerial),

    /// The certificate's validity window has closed.
    #[error("certificate {serial} expired at {not_after}")]
    Expired { serial: CertSerial, not_after: String },

    /// The certificate was revoked. Revocation is permanent per serial.
    #[error("certificate {serial} revoked: {reason}")]
    Revoked { serial: CertSerial, reason: String },

    /// The certificate was superseded by rotation.
    #[error("certificate {0} superseded by rotation")]
    Superseded(CertSerial),

    /// The certificate is issued but has never been activated.
    #[error("certificate {0} is issued but not active")]
    NotActivated(CertSerial),

    /// The issuer signature does not verify against the authority key.
    #[error("certificate {0} signature does not verify")]
    BadSignature(CertSerial),

    /// Key material could not be loaded or used.
    #[error("key provider error: {0}")]
    KeyProvider(String),

    /// The to-be-signed encoding could not be produced.
    #[error("certificate encoding error: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_serial() {
        let serial = CertSerial::new();
        let err = CaError::Superseded(serial);
        assert!(err.to_string().contains(&serial.to_string()));
    }

    #[test]
    fn revoked_display_includes_reason() {
        let err = CaError::Revoked {
            serial: CertSerial::new(),
            reason: "KEY_COMPROMISE".into(),
        };
        assert!(err.to_string().contains("KEY_COMPROMISE"));
    }
}

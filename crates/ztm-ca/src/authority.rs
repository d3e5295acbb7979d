// SPDX-License-Identifier: BUSL-1.1
//! # Certificate Authority
//!
//! Issues, rotates, and revokes certificates and verifies presented
//! chains against the issuer key and the registered lifecycle state.
//!
//! ## Security Invariant
//!
//! `verify_chain` fails closed. Every failure path returns a specific
//! [`CaError`] variant; there is no code path that treats an unknown or
//! partially-validated certificate as valid. Successful revocation emits
//! a [`RevocationNotice`] on a broadcast channel so that policy replicas
//! re-evaluate the affected principal within the propagation bound.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use ztm_core::{CertSerial, PrincipalId, Timestamp, ZtmError};

use crate::cert::{CertState, Certificate, RevocationReason};
use crate::error::CaError;
use crate::key_provider::KeyProvider;

/// Clock-skew tolerance applied to both edges of the validity window.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 60;

/// How many broadcast slots to buffer before slow subscribers lag.
const REVOCATION_CHANNEL_CAPACITY: usize = 256;

// ─── Principal Directory ─────────────────────────────────────────────────

/// Existence check for principals, consulted at issuance.
///
/// Provisioning owns the principal registry; the authority only needs to
/// know whether a principal exists, so the dependency is inverted behind
/// this trait.
pub trait PrincipalDirectory: Send + Sync {
    fn contains(&self, id: &PrincipalId) -> bool;
}

/// In-memory directory backed by a concurrent set.
#[derive(Default)]
pub struct MemoryDirectory {
    principals: DashMap<PrincipalId, ()>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: PrincipalId) {
        self.principals.insert(id, ());
    }
}

impl PrincipalDirectory for MemoryDirectory {
    fn contains(&self, id: &PrincipalId) -> bool {
        self.principals.contains_key(id)
    }
}

// ─── Revocation Notices ──────────────────────────────────────────────────

/// Broadcast to all subscribers when a certificate is newly revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationNotice {
    pub serial: CertSerial,
    pub principal_id: PrincipalId,
    pub reason: RevocationReason,
    pub revoked_at: Timestamp,
}

// ─── Certificate Authority ───────────────────────────────────────────────

/// The mesh certificate authority.
///
/// Holds every certificate it has ever signed, keyed by serial, plus the
/// current active serial per principal. All maps are concurrent; the
/// authority is shared across request handlers behind an `Arc`.
pub struct CertificateAuthority {
    key_provider: Arc<dyn KeyProvider>,
    directory: Arc<dyn PrincipalDirectory>,
    certs: DashMap<CertSerial, Certificate>,
    active_by_principal: DashMap<PrincipalId, CertSerial>,
    revocation_tx: tokio::sync::broadcast::Sender<RevocationNotice>,
    skew_secs: i64,
}

impl CertificateAuthority {
    pub fn new(
        key_provider: Arc<dyn KeyProvider>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        let (revocation_tx, _) = tokio::sync::broadcast::channel(REVOCATION_CHANNEL_CAPACITY);
        Self {
            key_provider,
            directory,
            certs: DashMap::new(),
            active_by_principal: DashMap::new(),
            revocation_tx,
            skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }

    pub fn with_clock_skew(mut self, skew_secs: i64) -> Self {
        self.skew_secs = skew_secs;
        self
    }

    /// Subscribe to revocation notices. Each subscriber sees every notice
    /// emitted after the subscription point.
    pub fn subscribe_revocations(&self) -> tokio::sync::broadcast::Receiver<RevocationNotice> {
        self.revocation_tx.subscribe()
    }

    /// Issue a new certificate for `principal_id`, valid for
    /// `validity_secs` from now. The certificate starts in `Issued` and
    /// must be activated before it verifies.
    ///
    /// Rejects unknown principals with `IdentityUnknown`.
    pub fn issue(
        &self,
        principal_id: PrincipalId,
        validity_secs: i64,
        subject_public_key: String,
    ) -> Result<Certificate, CaError> {
        if !self.directory.contains(&principal_id) {
            return Err(CaError::IdentityUnknown(principal_id.to_string()));
        }
        if validity_secs <= 0 {
            return Err(CaError::InvalidValidity(format!(
                "validity must be positive, got {validity_secs}s"
            )));
        }

        let now = Timestamp::now();
        let issuer_key = self.key_provider.verifying_key()?;
        let mut cert = Certificate {
            serial: CertSerial::new(),
            subject: principal_id,
            issuer: issuer_key.fingerprint(),
            subject_public_key,
            not_before: now,
            not_after: now.plus_secs(validity_secs),
            state: CertState::Issued,
            issued_at: now,
            signature: String::new(),
            revocation_reason: None,
            transitions: Vec::new(),
        };
        let tbs = cert.tbs_bytes()?;
        cert.signature = self.key_provider.sign(&tbs)?.to_hex();

        tracing::info!(
            serial = %cert.serial,
            principal = %principal_id,
            not_after = %cert.not_after,
            "certificate issued"
        );
        self.certs.insert(cert.serial, cert.clone());
        Ok(cert)
    }

    /// Activate an issued certificate, making it the principal's active
    /// certificate. Fails if the principal already has an active one —
    /// replacement goes through `rotate`.
    pub fn activate(&self, serial: CertSerial) -> Result<Certificate, CaError> {
        let subject = {
            let cert = self.certs.get(&serial).ok_or(CaError::UnknownSerial(serial))?;
            cert.subject
        };
        if let Some(existing) = self.active_by_principal.get(&subject) {
            return Err(CaError::InvalidTransition {
                serial,
                from: CertState::Issued.to_string(),
                to: format!("ACTIVE (principal already holds active {})", *existing),
            });
        }
        let cert = {
            let mut entry = self
                .certs
                .get_mut(&serial)
                .ok_or(CaError::UnknownSerial(serial))?;
            entry.activate()?;
            entry.clone()
        };
        self.active_by_principal.insert(subject, serial);
        tracing::info!(serial = %serial, principal = %subject, "certificate activated");
        Ok(cert)
    }

    /// Rotate an active certificate: the old serial is marked
    /// `Superseded` (not revoked) and a new active certificate with the
    /// same validity length is returned.
    pub fn rotate(&self, serial: CertSerial) -> Result<Certificate, CaError> {
        let (subject, validity_secs, public_key) = {
            let cert = self.certs.get(&serial).ok_or(CaError::UnknownSerial(serial))?;
            if cert.state != CertState::Active {
                return Err(CaError::InvalidTransition {
                    serial,
                    from: cert.state.to_string(),
                    to: CertState::Superseded.to_string(),
                });
            }
            (
                cert.subject,
                cert.not_before.secs_until(cert.not_after),
                cert.subject_public_key.clone(),
            )
        };

        let new_cert = self.issue(subject, validity_secs, public_key)?;
        {
            let mut old = self
                .certs
                .get_mut(&serial)
                .ok_or(CaError::UnknownSerial(serial))?;
            old.supersede(new_cert.serial)?;
        }
        self.active_by_principal.remove(&subject);
        let activated = self.activate(new_cert.serial)?;
        tracing::info!(
            old_serial = %serial,
            new_serial = %activated.serial,
            principal = %subject,
            "certificate rotated"
        );
        Ok(activated)
    }

    /// Revoke a certificate. Permanent per serial; revoking an
    /// already-revoked certificate is a no-op success. A fresh revocation
    /// emits a [`RevocationNotice`] to all subscribers.
    ///
    /// Returns `true` if this call performed the revocation.
    pub fn revoke(&self, serial: CertSerial, reason: RevocationReason) -> Result<bool, CaError> {
        let (newly_revoked, subject) = {
            let mut cert = self
                .certs
                .get_mut(&serial)
                .ok_or(CaError::UnknownSerial(serial))?;
            (cert.revoke(reason)?, cert.subject)
        };

        if newly_revoked {
            self.active_by_principal
                .remove_if(&subject, |_, active| *active == serial);
            let notice = RevocationNotice {
                serial,
                principal_id: subject,
                reason,
                revoked_at: Timestamp::now(),
            };
            tracing::warn!(
                serial = %serial,
                principal = %subject,
                reason = %reason,
                "certificate revoked"
            );
            // No subscribers is fine; the notice is simply dropped.
            let _ = self.revocation_tx.send(notice);
        }
        Ok(newly_revoked)
    }

    /// Verify a presented certificate chain. Fails closed: any
    /// validation error yields a specific reason, never a default-allow.
    ///
    /// Checks, in order: the serial is registered here, the issuer
    /// signature verifies, the registered state is `Active`, and the
    /// validity window (with clock-skew tolerance) contains `now`.
    pub fn verify_chain(&self, presented: &Certificate) -> Result<(), CaError> {
        let serial = presented.serial;
        let registered = self
            .certs
            .get(&serial)
            .ok_or(CaError::UnknownSerial(serial))?;

        let issuer_key = self.key_provider.verifying_key()?;
        let tbs = presented.tbs_bytes()?;
        let sig = crate::ed25519::Ed25519Signature::from_hex(&presented.signature)?;
        issuer_key
            .verify(&tbs, &sig)
            .map_err(|_| CaError::BadSignature(serial))?;

        match registered.state {
            CertState::Revoked => {
                return Err(CaError::Revoked {
                    serial,
                    reason: registered
                        .revocation_reason
                        .unwrap_or(RevocationReason::Unspecified)
                        .to_string(),
                });
            }
            CertState::Superseded => return Err(CaError::Superseded(serial)),
            CertState::Issued => return Err(CaError::NotActivated(serial)),
            CertState::Active => {}
        }

        let now = Timestamp::now();
        if registered.is_not_yet_valid(now, self.skew_secs) {
            return Err(CaError::NotYetValid(serial));
        }
        if registered.is_expired(now, self.skew_secs) {
            return Err(CaError::Expired {
                serial,
                not_after: registered.not_after.to_iso8601(),
            });
        }
        Ok(())
    }

    /// The principal's current active certificate, if any.
    pub fn active_cert(&self, principal_id: &PrincipalId) -> Option<Certificate> {
        let serial = *self.active_by_principal.get(principal_id)?;
        self.certs.get(&serial).map(|c| c.clone())
    }

    /// Look up a certificate by serial.
    pub fn get(&self, serial: &CertSerial) -> Option<Certificate> {
        self.certs.get(serial).map(|c| c.clone())
    }

    /// Whether the principal currently holds a certificate that would
    /// pass chain verification. Used by the trust scorer's
    /// identity-verification component: any missing, expired, revoked,
    /// or otherwise invalid certificate means the principal's effective
    /// trust collapses to UNTRUSTED.
    pub fn identity_verified(&self, principal_id: &PrincipalId) -> bool {
        match self.active_cert(principal_id) {
            Some(cert) => self.verify_chain(&cert).is_ok(),
            None => false,
        }
    }
}

impl From<CaError> for ZtmError {
    fn from(err: CaError) -> Self {
        match err {
            CaError::IdentityUnknown(id) => ZtmError::IdentityUnknown(id),
            CaError::Expired { serial, not_after } => ZtmError::CertificateExpired {
                serial: serial.to_string(),
                not_after,
            },
            CaError::Revoked { serial, reason } => ZtmError::CertificateRevoked {
                serial: serial.to_string(),
                reason,
            },
            CaError::InvalidTransition { .. } => ZtmError::InvalidTransition(err.to_string()),
            other => ZtmError::CertificateInvalid(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_provider::LocalKeyProvider;

    fn authority() -> (CertificateAuthority, PrincipalId) {
        let directory = Arc::new(MemoryDirectory::new());
        let principal = PrincipalId::new();
        directory.register(principal);
        let ca = CertificateAuthority::new(
            Arc::new(LocalKeyProvider::generate()),
            directory,
        );
        (ca, principal)
    }

    fn subject_key_hex() -> String {
        crate::ed25519::SigningKey::generate(&mut rand_core::OsRng)
            .verifying_key()
            .to_hex()
    }

    #[test]
    fn issue_rejects_unknown_principal() {
        let (ca, _) = authority();
        let err = ca.issue(PrincipalId::new(), 3600, subject_key_hex()).unwrap_err();
        assert!(matches!(err, CaError::IdentityUnknown(_)));
    }

    #[test]
    fn issue_rejects_empty_validity() {
        let (ca, principal) = authority();
        assert!(ca.issue(principal, 0, subject_key_hex()).is_err());
        assert!(ca.issue(principal, -5, subject_key_hex()).is_err());
    }

    #[test]
    fn issued_cert_does_not_verify_until_active() {
        let (ca, principal) = authority();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        assert!(matches!(
            ca.verify_chain(&cert),
            Err(CaError::NotActivated(_))
        ));

        ca.activate(cert.serial).unwrap();
        let active = ca.get(&cert.serial).unwrap();
        assert!(ca.verify_chain(&active).is_ok());
    }

    #[test]
    fn second_activation_for_principal_rejected() {
        let (ca, principal) = authority();
        let first = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(first.serial).unwrap();
        let second = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        assert!(ca.activate(second.serial).is_err());
    }

    #[test]
    fn rotate_supersedes_without_revoking() {
        let (ca, principal) = authority();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();

        let new_cert = ca.rotate(cert.serial).unwrap();
        assert_ne!(new_cert.serial, cert.serial);
        assert_eq!(new_cert.state, CertState::Active);

        let old = ca.get(&cert.serial).unwrap();
        assert_eq!(old.state, CertState::Superseded);
        assert!(old.revocation_reason.is_none());
        assert!(matches!(
            ca.verify_chain(&old),
            Err(CaError::Superseded(_))
        ));

        assert_eq!(
            ca.active_cert(&principal).unwrap().serial,
            new_cert.serial
        );
    }

    #[test]
    fn rotation_does_not_broadcast() {
        let (ca, principal) = authority();
        let mut rx = ca.subscribe_revocations();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();
        ca.rotate(cert.serial).unwrap();
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn revoke_is_idempotent_and_broadcasts_once() {
        let (ca, principal) = authority();
        let mut rx = ca.subscribe_revocations();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();

        assert!(ca.revoke(cert.serial, RevocationReason::KeyCompromise).unwrap());
        assert!(!ca.revoke(cert.serial, RevocationReason::KeyCompromise).unwrap());

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.serial, cert.serial);
        assert_eq!(notice.principal_id, principal);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn revoked_cert_fails_verification_with_reason() {
        let (ca, principal) = authority();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();
        ca.revoke(cert.serial, RevocationReason::PrivilegeWithdrawn).unwrap();

        let presented = ca.get(&cert.serial).unwrap();
        match ca.verify_chain(&presented) {
            Err(CaError::Revoked { reason, .. }) => {
                assert_eq!(reason, "PRIVILEGE_WITHDRAWN");
            }
            other => panic!("expected Revoked, got {other:?}"),
        }
        assert!(ca.active_cert(&principal).is_none());
        assert!(!ca.identity_verified(&principal));
    }

    #[test]
    fn revoke_unknown_serial_is_error() {
        let (ca, _) = authority();
        assert!(matches!(
            ca.revoke(CertSerial::new(), RevocationReason::Unspecified),
            Err(CaError::UnknownSerial(_))
        ));
    }

    #[test]
    fn unknown_serial_fails_closed() {
        let (ca, principal) = authority();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        let mut forged = cert;
        forged.serial = CertSerial::new();
        assert!(matches!(
            ca.verify_chain(&forged),
            Err(CaError::UnknownSerial(_))
        ));
    }

    #[test]
    fn tampered_signature_rejected() {
        let (ca, principal) = authority();
        let cert = ca.issue(principal, 3600, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();

        let mut tampered = ca.get(&cert.serial).unwrap();
        tampered.not_after = tampered.not_after.plus_secs(86_400 * 365);
        assert!(matches!(
            ca.verify_chain(&tampered),
            Err(CaError::BadSignature(_))
        ));
    }

    #[test]
    fn expired_cert_rejected() {
        let (ca, principal) = authority();
        let ca = ca.with_clock_skew(0);
        let cert = ca.issue(principal, 1, subject_key_hex()).unwrap();
        ca.activate(cert.serial).unwrap();

        // Force the registered window into the past.
        {
            let mut entry = ca.certs.get_mut(&cert.serial).unwrap();
            entry.not_before = Timestamp::now().plus_secs(-7200);
            entry.not_after = Timestamp::now().plus_secs(-3600);
        }
        let mut presented = ca.get(&cert.serial).unwrap();
        let tbs = presented.tbs_bytes().unwrap();
        presented.signature = ca.key_provider.sign(&tbs).unwrap().to_hex();

        assert!(matches!(
            ca.verify_chain(&presented),
            Err(CaError::Expired { .. })
        ));
        assert!(!ca.identity_verified(&principal));
    }

    #[test]
    fn identity_verified_false_without_cert() {
        let (ca, principal) = authority();
        assert!(!ca.identity_verified(&principal));
    }
}

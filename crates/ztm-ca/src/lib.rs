// SPDX-License-Identifier: BUSL-1.1
//! # ztm-ca — Identity & Certificate Authority
//!
//! Issues, rotates, and revokes per-principal certificates and verifies
//! presented chains. Certificates follow a strict per-serial state machine:
//!
//! ```text
//! ISSUED ──▶ ACTIVE ──▶ SUPERSEDED
//!    │          │
//!    └──────────┴──────▶ REVOKED (terminal)
//! ```
//!
//! ## Security Invariant
//!
//! Verification **fails closed**: every chain-validation error (expired,
//! not yet valid, revoked, superseded, unknown serial, bad signature)
//! produces a specific failure reason, never a default-allow. Rotation
//! marks the old serial SUPERSEDED, which is distinct from revocation —
//! a superseded certificate still fails verification, but carries no
//! revocation reason and triggers no revocation broadcast.
//!
//! ## Crate Policy
//!
//! Key material lives behind the [`KeyProvider`] trait and is zeroized
//! on drop. Signing input is always the canonical to-be-signed encoding
//! produced by [`cert::Certificate::tbs_bytes`].

pub mod authority;
pub mod cert;
pub mod ed25519;
pub mod error;
pub mod key_provider;

pub use authority::{
    CertificateAuthority, MemoryDirectory, PrincipalDirectory, RevocationNotice,
};
pub use cert::{CertState, CertTransitionRecord, Certificate, RevocationReason};
pub use ed25519::{Ed25519Signature, SigningKey, VerifyingKey};
pub use error::CaError;
pub use key_provider::{EnvKeyProvider, KeyProvider, LocalKeyProvider};

// SPDX-License-Identifier: BUSL-1.1
//! # Ed25519 Signing and Verification
//!
//! Thin wrappers over `ed25519_dalek` with mesh conventions: hex
//! encodings at the serialization boundary, SHA-256 fingerprints for
//! key identification in logs and audit records, and zeroization of
//! private key material on drop (provided by `ed25519_dalek`'s
//! `zeroize` feature).

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha256};

use crate::error::CaError;

/// Re-exported so callers can match on raw verification failures
/// without depending on `ed25519_dalek` directly.
pub use ed25519_dalek::SignatureError;

/// An Ed25519 digital signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Signature(pub Vec<u8>);

impl Ed25519Signature {
    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, CaError> {
        let bytes = hex_to_bytes(hex)?;
        if bytes.len() != 64 {
            return Err(CaError::Encoding(format!(
                "signature must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }
}

/// An Ed25519 signing (private) key.
///
/// Key material is zeroized when the inner `ed25519_dalek::SigningKey`
/// is dropped.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a fresh key from a cryptographically secure RNG.
    pub fn generate<R: rand_core::CryptoRngCore>(rng: &mut R) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(rng),
        }
    }

    /// Construct from a raw 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Export the raw 32-byte seed. Callers own the copy; it is not
    /// zeroized with this key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.inner.sign(message).to_vec())
    }

    /// The corresponding verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }
}

/// An Ed25519 verifying (public) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Verify a signature over `message`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Ed25519Signature,
    ) -> Result<(), SignatureError> {
        let sig_bytes: [u8; 64] = signature
            .0
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::new())?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        self.inner.verify(message, &sig)
    }

    /// Public key as a 64-character hex string.
    pub fn to_hex(&self) -> String {
        bytes_to_hex(self.inner.as_bytes())
    }

    /// Parse a public key from its hex form.
    pub fn from_hex(hex: &str) -> Result<Self, CaError> {
        let bytes = hex_to_bytes(hex)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CaError::Encoding(format!(
                "public key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let inner = ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map_err(|e| CaError::Encoding(format!("invalid public key: {e}")))?;
        Ok(Self { inner })
    }

    /// SHA-256 fingerprint of the public key, hex-encoded.
    ///
    /// Used to identify keys in logs and audit records without printing
    /// the key itself.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.as_bytes());
        bytes_to_hex(&hasher.finalize())
    }
}

/// Hex-encode a byte slice (lowercase).
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string into bytes. Rejects odd-length and non-hex input.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, CaError> {
    if hex.len() % 2 != 0 {
        return Err(CaError::Encoding(format!(
            "hex string has odd length {}",
            hex.len()
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| CaError::Encoding(format!("invalid hex at offset {i}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sign_and_verify() {
        let key = SigningKey::generate(&mut rand_core::OsRng);
        let sig = key.sign(b"cross-zone request");
        assert!(key.verifying_key().verify(b"cross-zone request", &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = SigningKey::generate(&mut rand_core::OsRng);
        let sig = key.sign(b"original");
        assert!(key.verifying_key().verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let key = SigningKey::generate(&mut rand_core::OsRng);
        let other = SigningKey::generate(&mut rand_core::OsRng);
        let sig = key.sign(b"msg");
        assert!(other.verifying_key().verify(b"msg", &sig).is_err());
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [7u8; 32];
        let a = SigningKey::from_bytes(&seed);
        let b = SigningKey::from_bytes(&seed);
        assert_eq!(a.verifying_key(), b.verifying_key());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let key = SigningKey::generate(&mut rand_core::OsRng);
        let vk = key.verifying_key();
        let parsed = VerifyingKey::from_hex(&vk.to_hex()).unwrap();
        assert_eq!(parsed, vk);
    }

    #[test]
    fn signature_hex_roundtrip() {
        let key = SigningKey::generate(&mut rand_core::OsRng);
        let sig = key.sign(b"payload");
        let parsed = Ed25519Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn fingerprint_is_stable_sha256() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let fp1 = key.verifying_key().fingerprint();
        let fp2 = key.verifying_key().fingerprint();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
    }

    #[test]
    fn hex_decode_rejects_bad_input() {
        assert!(hex_to_bytes("abc").is_err());
        assert!(hex_to_bytes("zz").is_err());
        assert_eq!(hex_to_bytes("").unwrap(), Vec::<u8>::new());
    }

    proptest! {
        #[test]
        fn hex_roundtrips_arbitrary_bytes(bytes in proptest::collection::vec(0u8.., 0..64)) {
            let hex = bytes_to_hex(&bytes);
            prop_assert_eq!(hex_to_bytes(&hex).unwrap(), bytes);
        }

        #[test]
        fn seed_roundtrips_through_export(seed in proptest::array::uniform32(0u8..)) {
            let key = SigningKey::from_bytes(&seed);
            prop_assert_eq!(key.to_bytes(), seed);
        }
    }
}

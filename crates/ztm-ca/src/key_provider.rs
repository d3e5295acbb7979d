// SPDX-License-Identifier: BUSL-1.1
//! # Key Provider Abstraction
//!
//! Abstracts issuer key storage and signing behind a trait, enabling
//! multiple backends:
//!
//! - [`LocalKeyProvider`]: In-memory key for development and testing.
//! - [`EnvKeyProvider`]: Loads key material from an environment variable
//!   (hex-encoded 32-byte Ed25519 seed). Suitable for container
//!   deployments where secrets are injected via environment.
//!
//! ## Security Invariants
//!
//! - All key material is zeroized on drop.
//! - `KeyProvider` is `Send + Sync` for use across async tasks.

use crate::ed25519::{hex_to_bytes, Ed25519Signature, SigningKey, VerifyingKey};
use crate::error::CaError;

/// Trait for issuer key storage and signing backends.
///
/// Implementations must be `Send + Sync` for use in multi-threaded
/// async runtimes.
pub trait KeyProvider: Send + Sync {
    /// Sign the to-be-signed certificate encoding with the issuer key.
    fn sign(&self, data: &[u8]) -> Result<Ed25519Signature, CaError>;

    /// Return the issuer verifying (public) key.
    fn verifying_key(&self) -> Result<VerifyingKey, CaError>;

    /// Human-readable name for this provider (for diagnostics/logging).
    fn provider_name(&self) -> &str;
}

// ─── LocalKeyProvider ────────────────────────────────────────────────────

/// In-memory issuer key for development and testing.
pub struct LocalKeyProvider {
    key: SigningKey,
}

impl LocalKeyProvider {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a new random key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Create from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }
}

impl KeyProvider for LocalKeyProvider {
    fn sign(&self, data: &[u8]) -> Result<Ed25519Signature, CaError> {
        Ok(self.key.sign(data))
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CaError> {
        Ok(self.key.verifying_key())
    }

    fn provider_name(&self) -> &str {
        "LocalKeyProvider"
    }
}

// ─── EnvKeyProvider ──────────────────────────────────────────────────────

/// Loads the issuer signing key from an environment variable.
///
/// The variable must contain a 64-character hex string encoding the
/// 32-byte Ed25519 seed. The key is loaded once at construction and
/// held in memory (zeroized on drop).
///
/// ## Example
///
/// ```bash
/// export ZTM_ISSUER_KEY="deadbeef..."  # 64 hex chars
/// ```
pub struct EnvKeyProvider {
    key: SigningKey,
    var_name: String,
}

impl EnvKeyProvider {
    /// Load the signing key from the named environment variable.
    pub fn from_env(var_name: &str) -> Result<Self, CaError> {
        let hex = std::env::var(var_name).map_err(|_| {
            CaError::KeyProvider(format!("environment variable {var_name} not set"))
        })?;

        let bytes = hex_to_bytes(&hex)?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            CaError::KeyProvider(format!(
                "expected 32 bytes (64 hex chars) in {var_name}, got {} hex chars",
                hex.len()
            ))
        })?;

        Ok(Self {
            key: SigningKey::from_bytes(&seed),
            var_name: var_name.to_string(),
        })
    }

    /// The environment variable name this provider was loaded from.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl KeyProvider for EnvKeyProvider {
    fn sign(&self, data: &[u8]) -> Result<Ed25519Signature, CaError> {
        Ok(self.key.sign(data))
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CaError> {
        Ok(self.key.verifying_key())
    }

    fn provider_name(&self) -> &str {
        "EnvKeyProvider"
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_provider_sign_and_verify() {
        let provider = LocalKeyProvider::generate();
        let sig = provider.sign(b"tbs bytes").expect("sign");
        let vk = provider.verifying_key().expect("vk");
        assert!(vk.verify(b"tbs bytes", &sig).is_ok());
    }

    #[test]
    fn local_provider_from_seed_deterministic() {
        let seed = [42u8; 32];
        let p1 = LocalKeyProvider::from_seed(&seed);
        let p2 = LocalKeyProvider::from_seed(&seed);
        assert_eq!(
            p1.verifying_key().expect("vk1"),
            p2.verifying_key().expect("vk2"),
        );
    }

    #[test]
    fn provider_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LocalKeyProvider>();
    }

    #[test]
    fn trait_object_safe() {
        let provider = LocalKeyProvider::generate();
        let _boxed: Box<dyn KeyProvider> = Box::new(provider);
    }

    #[test]
    fn env_provider_missing_var() {
        assert!(EnvKeyProvider::from_env("ZTM_TEST_KEY_THAT_DOES_NOT_EXIST_9913").is_err());
    }

    #[test]
    fn env_provider_loads_seed() {
        let seed = [0xab_u8; 32];
        let hex: String = seed.iter().map(|b| format!("{b:02x}")).collect();
        let var = "ZTM_TEST_ISSUER_KEY_LOAD";
        std::env::set_var(var, &hex);

        let provider = EnvKeyProvider::from_env(var).expect("from_env");
        assert_eq!(provider.provider_name(), "EnvKeyProvider");
        assert_eq!(provider.var_name(), var);

        let local = LocalKeyProvider::from_seed(&seed);
        assert_eq!(
            provider.verifying_key().expect("vk env"),
            local.verifying_key().expect("vk local"),
        );

        std::env::remove_var(var);
    }

    #[test]
    fn env_provider_invalid_hex() {
        let var = "ZTM_TEST_ISSUER_KEY_BAD_HEX";
        std::env::set_var(var, "not-valid-hex");
        assert!(EnvKeyProvider::from_env(var).is_err());
        std::env::remove_var(var);
    }

    #[test]
    fn env_provider_wrong_length() {
        let var = "ZTM_TEST_ISSUER_KEY_SHORT";
        std::env::set_var(var, "aabbccdd");
        assert!(EnvKeyProvider::from_env(var).is_err());
        std::env::remove_var(var);
    }
}

// SPDX-License-Identifier: BUSL-1.1
//! # Service Configuration
//!
//! YAML configuration file + environment overrides. Every section has
//! serde defaults so a minimal deployment can run with an empty file,
//! but the zone table is validated on load: an unknown peer reference
//! or an asymmetric adjacency declaration is fatal at startup, never a
//! hot-path surprise.
//!
//! Environment overrides (take precedence over the file):
//! - `ZTM_BIND_ADDR`   — listen address
//! - `ZTM_AUTH_TOKEN`  — bearer token for the `/v1/*` surface
//! - `ZTM_SIGNING_SEED_HEX` — issuer key seed (consumed by the key
//!   provider, see [`ztm_ca::EnvKeyProvider`])

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ztm_core::Zone;
use ztm_monitor::MonitorConfig;
use ztm_policy::PolicyConfig;
use ztm_trust::ScorerConfig;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// Bearer token required on `/v1/*`. `None` disables authentication
    /// (development only; the server logs a warning).
    pub auth_token: Option<String>,
    /// The segmentation zone table. Validated via
    /// [`ztm_core::ZoneTable::from_config`] before the server starts.
    pub zones: Vec<Zone>,
    /// Per-zone context score in `[0, 1]`, keyed by zone id. Principals
    /// in an unlisted zone get `default_context_score`.
    pub zone_context: BTreeMap<String, f64>,
    /// Context score for principals whose zone carries no explicit entry.
    pub default_context_score: f64,
    /// Behavioral monitor tuning.
    pub monitor: MonitorConfig,
    /// Trust scorer tuning.
    pub scorer: ScorerConfig,
    /// Policy engine tuning.
    pub policy: PolicyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            auth_token: None,
            zones: Vec::new(),
            zone_context: BTreeMap::new(),
            default_context_score: 0.5,
            monitor: MonitorConfig::default(),
            scorer: ScorerConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides. A missing path yields the defaults plus overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", p.display()))?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", p.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ZTM_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ZTM_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(token) = std::env::var("ZTM_AUTH_TOKEN") {
            if !token.is_empty() {
                self.auth_token = Some(token);
            }
        }
    }

    /// Validate cross-field constraints the serde layer cannot express.
    /// The zone table itself is validated separately when the
    /// [`ztm_core::ZoneTable`] is built.
    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.default_context_score) {
            anyhow::bail!(
                "default_context_score must be in [0, 1], got {}",
                self.default_context_score
            );
        }
        for (zone, score) in &self.zone_context {
            if !(0.0..=1.0).contains(score) {
                anyhow::bail!("zone_context[{zone}] must be in [0, 1], got {score}");
            }
            if !self.zones.iter().any(|z| z.id.as_str() == zone) {
                anyhow::bail!("zone_context references unknown zone: {zone}");
            }
        }
        Ok(())
    }
}

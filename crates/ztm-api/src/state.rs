// SPDX-License-Identifier: BUSL-1.1
//! # Shared Application State
//!
//! `AppState` wires the domain crates together behind `Arc`s and is
//! cloned into every handler. The principal registry lives here: it is
//! the provisioning surface the certificate authority's unknown-identity
//! guarantee depends on, and it answers the policy engine's "which zone
//! is this principal in" question.
//!
//! ## Security Invariant
//!
//! A principal that has never been `POST /v1/principals`-ed does not
//! exist anywhere in the engine: the CA refuses to issue for it and the
//! policy engine denies on its behalf (no zone ⇒ no permitted crossing).

use std::sync::Arc;

use dashmap::DashMap;
use sqlx::postgres::PgPool;

use ztm_ca::{CertificateAuthority, KeyProvider, LocalKeyProvider, PrincipalDirectory};
use ztm_core::{Principal, PrincipalId, ZoneId, ZoneTable};
use ztm_monitor::{BehaviorMonitor, IngestPool, WeightedZScore};
use ztm_policy::{AuditLog, PolicyEngine, PrincipalZones};
use ztm_trust::{ContextProvider, TrustScorer, TrustStore};

use crate::config::AppConfig;

/// Environment variable holding the hex-encoded issuer signing seed.
pub const SIGNING_SEED_VAR: &str = "ZTM_SIGNING_SEED_HEX";

/// In-memory principal registry, shared between the CA (identity
/// existence), the policy engine (zone membership), and the scorer
/// (zone-derived context).
#[derive(Default)]
pub struct PrincipalRegistry {
    principals: DashMap<PrincipalId, Principal>,
}

impl PrincipalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal. Returns `false` if the id already existed
    /// (the existing record is left untouched).
    pub fn register(&self, principal: Principal) -> bool {
        match self.principals.entry(principal.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(principal);
                true
            }
        }
    }

    pub fn get(&self, id: &PrincipalId) -> Option<Principal> {
        self.principals.get(id).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Snapshot of all registered principals.
    pub fn list(&self) -> Vec<Principal> {
        self.principals.iter().map(|p| p.clone()).collect()
    }
}

impl PrincipalDirectory for PrincipalRegistry {
    fn contains(&self, id: &PrincipalId) -> bool {
        self.principals.contains_key(id)
    }
}

impl PrincipalZones for PrincipalRegistry {
    fn zone_of(&self, principal_id: &PrincipalId) -> Option<ZoneId> {
        self.principals.get(principal_id).map(|p| p.zone_id.clone())
    }
}

/// Context scores derived from zone membership: each zone carries a
/// configured score, principals inherit their zone's. Unknown
/// principals and unlisted zones get the configured default.
pub struct ZoneContext {
    registry: Arc<PrincipalRegistry>,
    scores: std::collections::BTreeMap<String, f64>,
    default_score: f64,
}

impl ZoneContext {
    pub fn new(registry: Arc<PrincipalRegistry>, config: &AppConfig) -> Self {
        Self {
            registry,
            scores: config.zone_context.clone(),
            default_score: config.default_context_score,
        }
    }
}

impl ContextProvider for ZoneContext {
    fn context_score(&self, principal_id: &PrincipalId) -> f64 {
        self.registry
            .zone_of(principal_id)
            .and_then(|zone| self.scores.get(zone.as_str()).copied())
            .unwrap_or(self.default_score)
    }
}

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub zones: Arc<ZoneTable>,
    pub registry: Arc<PrincipalRegistry>,
    pub key_provider: Arc<dyn KeyProvider>,
    pub ca: Arc<CertificateAuthority>,
    pub monitor: Arc<BehaviorMonitor>,
    pub store: Arc<TrustStore>,
    pub scorer: Arc<TrustScorer>,
    pub audit: Arc<AuditLog>,
    pub engine: Arc<PolicyEngine>,
    /// Sharded ingestion workers for the bulk telemetry path. Present
    /// only when spawned inside a tokio runtime; the single-event path
    /// ingests synchronously and never needs it.
    pub ingest_pool: Option<Arc<IngestPool>>,
    /// Optional Postgres persistence. Absent pool means in-memory only.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Build the full engine from a validated configuration.
    ///
    /// Zone table misconfiguration (`PolicyConflict`) is rejected here,
    /// before the server binds — never on the evaluation hot path.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let key_provider: Arc<dyn KeyProvider> = match std::env::var(SIGNING_SEED_VAR) {
            Ok(_) => Arc::new(ztm_ca::EnvKeyProvider::from_env(SIGNING_SEED_VAR)?),
            Err(_) => {
                tracing::warn!(
                    "{SIGNING_SEED_VAR} not set — using an ephemeral issuer key. \
                     Certificates will not survive restarts."
                );
                Arc::new(LocalKeyProvider::generate())
            }
        };
        Self::with_key_provider(config, key_provider)
    }

    /// Build the engine with an explicit issuer key provider.
    pub fn with_key_provider(
        config: AppConfig,
        key_provider: Arc<dyn KeyProvider>,
    ) -> anyhow::Result<Self> {
        let zones = Arc::new(ZoneTable::from_config(config.zones.clone())?);
        let registry = Arc::new(PrincipalRegistry::new());

        let ca = Arc::new(CertificateAuthority::new(
            Arc::clone(&key_provider),
            Arc::clone(&registry) as Arc<dyn PrincipalDirectory>,
        ));

        let monitor = Arc::new(BehaviorMonitor::new(
            config.monitor.clone(),
            Arc::new(WeightedZScore::default()),
        ));

        let store = Arc::new(TrustStore::new());
        let context = Arc::new(ZoneContext::new(Arc::clone(&registry), &config));
        let scorer = Arc::new(TrustScorer::new(
            Arc::clone(&ca),
            Arc::clone(&monitor),
            Arc::clone(&store),
            context,
            config.scorer.clone(),
        ));

        let audit = Arc::new(AuditLog::new());
        let engine = Arc::new(PolicyEngine::new(
            Arc::clone(&zones),
            Arc::clone(&store) as Arc<dyn ztm_trust::AssessmentSource>,
            Arc::clone(&registry) as Arc<dyn PrincipalZones>,
            Arc::clone(&audit),
            config.policy.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            zones,
            registry,
            key_provider,
            ca,
            monitor,
            store,
            scorer,
            audit,
            engine,
            ingest_pool: None,
            db_pool: None,
        })
    }

    /// Spawn the sharded ingestion pool. Must be called inside a tokio
    /// runtime.
    pub fn spawn_ingest_pool(mut self) -> Self {
        self.ingest_pool = Some(Arc::new(IngestPool::spawn(Arc::clone(&self.monitor))));
        self
    }

    /// Attach a Postgres pool for persistence.
    pub fn with_db_pool(mut self, pool: Option<PgPool>) -> Self {
        self.db_pool = pool;
        self
    }
}

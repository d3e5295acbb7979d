// SPDX-License-Identifier: BUSL-1.1
//! # Policy Engine
//!
//! The synchronous `Evaluate(source_principal, dest_zone)` request path.
//! Gates, in order: terminal revocation, trust-state fetch (fail closed,
//! with bounded retries and a last-known-good fallback), staleness
//! against the revocation watermark, zone adjacency, trust threshold,
//! and finally drift quarantine.
//!
//! ## Security Invariant
//!
//! The deny gates always win over quarantine: `QUARANTINE` is only
//! issued for traffic that would otherwise be allowed. Once a
//! revocation notice for a principal has been observed, no assessment
//! computed before that instant is ever acted on.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use ztm_ca::RevocationNotice;
use ztm_core::{PrincipalId, Timestamp, ZoneId, ZoneTable, ZtmError};
use ztm_monitor::Maturity;
use ztm_trust::{AssessmentSource, TrustAssessment};

use crate::audit::{AuditLog, AuditRecord};
use crate::decision::{PolicyAction, PolicyDecision, ReasonCode};
use crate::enforcement::{EnforcementRegistry, EnforcementState};

// ─── Collaborator Seams ──────────────────────────────────────────────────

/// Where a principal currently resides. Backed by the provisioning
/// registry in deployment.
pub trait PrincipalZones: Send + Sync {
    fn zone_of(&self, principal_id: &PrincipalId) -> Option<ZoneId>;
}

// ─── Configuration ───────────────────────────────────────────────────────

/// Policy engine tuning. All fields have serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Cache TTL for decisions computed from fresh trust state.
    pub decision_ttl_secs: i64,
    /// Shortened TTL for decisions computed from last-known-good state.
    pub provisional_ttl_secs: i64,
    /// Maximum time for a revocation to become visible to every replica.
    pub propagation_bound_secs: i64,
    /// Fetch attempts against the trust store before falling back.
    pub store_retry_attempts: u32,
    /// The scorer's re-evaluation cycle, used for level decay.
    pub assessment_cycle_secs: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            decision_ttl_secs: 5,
            provisional_ttl_secs: 1,
            propagation_bound_secs: 5,
            store_retry_attempts: 3,
            assessment_cycle_secs: 30,
        }
    }
}

// ─── Policy Engine ───────────────────────────────────────────────────────

/// The segmentation enforcer.
pub struct PolicyEngine {
    zones: Arc<ZoneTable>,
    assessments: Arc<dyn AssessmentSource>,
    principal_zones: Arc<dyn PrincipalZones>,
    enforcement: EnforcementRegistry,
    audit: Arc<AuditLog>,
    cache: DashMap<(PrincipalId, ZoneId), PolicyDecision>,
    /// Instant of the most recent known revocation per principal.
    watermarks: DashMap<PrincipalId, Timestamp>,
    /// Fallback state for when the trust store is unavailable.
    last_known_good: DashMap<PrincipalId, TrustAssessment>,
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(
        zones: Arc<ZoneTable>,
        assessments: Arc<dyn AssessmentSource>,
        principal_zones: Arc<dyn PrincipalZones>,
        audit: Arc<AuditLog>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            zones,
            assessments,
            principal_zones,
            enforcement: EnforcementRegistry::new(),
            audit,
            cache: DashMap::new(),
            watermarks: DashMap::new(),
            last_known_good: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn enforcement_state(&self, principal_id: &PrincipalId) -> EnforcementState {
        self.enforcement.state(principal_id)
    }

    /// Evaluate one cross-zone request. Infallible by construction:
    /// every internal failure is a deny with a reason code.
    pub fn evaluate(&self, source_principal: PrincipalId, dest_zone: &ZoneId) -> PolicyDecision {
        let now = Timestamp::now();

        // Terminal revocation wins over everything, including the cache.
        if self.enforcement.state(&source_principal) == EnforcementState::Revoked {
            return self.decide(
                source_principal,
                dest_zone.clone(),
                PolicyAction::Deny,
                ReasonCode::CertificateRevoked,
                self.config.decision_ttl_secs,
                now,
            );
        }

        if let Some(cached) = self.cached(&source_principal, dest_zone, now) {
            return cached;
        }

        let (assessment, provisional) = match self.fetch_assessment(&source_principal) {
            Ok(Some(assessment)) => {
                self.last_known_good
                    .insert(source_principal, assessment.clone());
                (assessment, false)
            }
            Ok(None) => {
                // Never assessed: effectively UNTRUSTED.
                return self.decide(
                    source_principal,
                    dest_zone.clone(),
                    PolicyAction::Deny,
                    ReasonCode::TrustBelowThreshold,
                    self.config.decision_ttl_secs,
                    now,
                );
            }
            Err(err) => {
                tracing::error!(principal = %source_principal, %err, "trust store unavailable");
                match self.last_known_good.get(&source_principal) {
                    Some(lkg) => (lkg.clone(), true),
                    None => {
                        return self.decide(
                            source_principal,
                            dest_zone.clone(),
                            PolicyAction::Deny,
                            ReasonCode::TrustBelowThreshold,
                            self.config.provisional_ttl_secs,
                            now,
                        );
                    }
                }
            }
        };

        // An assessment computed before a known revocation is stale and
        // must never drive an allow.
        if let Some(watermark) = self.watermarks.get(&source_principal) {
            if assessment.computed_at.is_before(*watermark) {
                return self.decide(
                    source_principal,
                    dest_zone.clone(),
                    PolicyAction::Deny,
                    ReasonCode::StaleAssessment,
                    self.config.provisional_ttl_secs,
                    now,
                );
            }
        }

        let ttl = if provisional {
            self.config.provisional_ttl_secs
        } else {
            self.config.decision_ttl_secs
        };

        // Zone adjacency: unknown zones and non-adjacent crossings deny
        // regardless of trust level.
        let source_zone = self.principal_zones.zone_of(&source_principal);
        let adjacency_ok = match &source_zone {
            Some(zone) => self.zones.crossing_permitted(zone, dest_zone),
            None => false,
        };
        if !adjacency_ok {
            return self.decide(
                source_principal,
                dest_zone.clone(),
                PolicyAction::Deny,
                ReasonCode::ZonePolicyViolation,
                ttl,
                now,
            );
        }

        // Threshold: the destination's entry bar against the decayed level.
        let level = assessment.effective_level(now, self.config.assessment_cycle_secs);
        let min_required = match self.zones.get(dest_zone) {
            Some(zone) => zone.min_trust_for_entry,
            None => {
                return self.decide(
                    source_principal,
                    dest_zone.clone(),
                    PolicyAction::Deny,
                    ReasonCode::ZonePolicyViolation,
                    ttl,
                    now,
                );
            }
        };
        if !level.satisfies(min_required) {
            return self.decide(
                source_principal,
                dest_zone.clone(),
                PolicyAction::Deny,
                ReasonCode::TrustBelowThreshold,
                ttl,
                now,
            );
        }

        // Drift: otherwise-allowed traffic is quarantined while the
        // source baseline is drifting.
        if assessment.maturity == Maturity::DriftDetected {
            self.enforcement.mark_quarantined(source_principal);
            return self.decide(
                source_principal,
                dest_zone.clone(),
                PolicyAction::Quarantine,
                ReasonCode::BehaviorDrift,
                ttl,
                now,
            );
        }

        self.enforcement.mark_active(source_principal);
        self.decide(
            source_principal,
            dest_zone.clone(),
            PolicyAction::Allow,
            ReasonCode::TrustSufficient,
            ttl,
            now,
        )
    }

    /// Record a revocation: set the staleness watermark, drive the
    /// enforcement state terminal, and drop the principal's cached
    /// decisions.
    pub fn note_revocation(&self, notice: &RevocationNotice) {
        self.watermarks
            .insert(notice.principal_id, notice.revoked_at);
        self.enforcement.mark_revoked(notice.principal_id);
        self.cache
            .retain(|(principal, _), _| *principal != notice.principal_id);
        tracing::warn!(
            principal = %notice.principal_id,
            serial = %notice.serial,
            "revocation noted; cached decisions invalidated"
        );
    }

    fn cached(
        &self,
        principal: &PrincipalId,
        dest_zone: &ZoneId,
        now: Timestamp,
    ) -> Option<PolicyDecision> {
        let key = (*principal, dest_zone.clone());
        let entry = self.cache.get(&key)?;
        if entry.is_expired(now) {
            drop(entry);
            self.cache.remove(&key);
            return None;
        }
        Some(entry.clone())
    }

    fn fetch_assessment(
        &self,
        principal: &PrincipalId,
    ) -> Result<Option<TrustAssessment>, ZtmError> {
        let attempts = self.config.store_retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.assessments.fetch(principal) {
                Ok(found) => return Ok(found),
                Err(err @ ZtmError::StoreUnavailable(_)) => {
                    tracing::warn!(%principal, attempt, %err, "trust store fetch failed");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ZtmError::StoreUnavailable("fetch failed with no error detail".into())
        }))
    }

    fn decide(
        &self,
        source_principal: PrincipalId,
        dest_zone: ZoneId,
        action: PolicyAction,
        reason_code: ReasonCode,
        ttl_secs: i64,
        now: Timestamp,
    ) -> PolicyDecision {
        let decision = PolicyDecision {
            source_principal,
            dest_zone: dest_zone.clone(),
            action,
            reason_code,
            ttl_secs,
            decided_at: now,
        };
        tracing::info!(
            principal = %source_principal,
            dest = %dest_zone,
            action = %action,
            reason = %reason_code,
            "policy decision"
        );
        self.cache
            .insert((source_principal, dest_zone), decision.clone());
        self.audit.append(AuditRecord::Decision(decision.clone()));
        decision
    }
}

// ─── Revocation Listener ─────────────────────────────────────────────────

/// Subscribe the engine to revocation notices. The listener exits when
/// the authority drops its broadcast sender or `shutdown` flips true.
pub fn spawn_revocation_listener(
    engine: Arc<PolicyEngine>,
    mut revocations: tokio::sync::broadcast::Receiver<RevocationNotice>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                notice = revocations.recv() => match notice {
                    Ok(notice) => engine.note_revocation(&notice),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "revocation notices lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

// SPDX-License-Identifier: BUSL-1.1
//! # Trust Scorer
//!
//! Combines identity verification, behavioral anomaly scores, and
//! context weights into a [`TrustAssessment`], mapping the weighted
//! composite onto the six trust bands with hysteresis.
//!
//! ## Evaluation Triggers
//!
//! `evaluate` runs on a periodic tick, on activity notification from
//! the behavioral monitor, and on revocation notices from the
//! certificate authority. All three paths race harmlessly: commits go
//! through the store's version CAS and a losing evaluation re-reads
//! and recomputes.
//!
//! ## Security Invariant
//!
//! A failed chain verification short-circuits the whole computation to
//! `UNTRUSTED` — no behavioral or context score can compensate for a
//! missing, expired, or revoked certificate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ztm_ca::CertificateAuthority;
use ztm_core::{PrincipalId, Timestamp, TrustLevel};
use ztm_monitor::{BehaviorMonitor, Maturity};

use crate::assessment::TrustAssessment;
use crate::error::TrustError;
use crate::store::TrustStore;

/// CAS attempts before an evaluation gives up.
const COMMIT_ATTEMPTS: usize = 3;

// ─── Context Provider ────────────────────────────────────────────────────

/// Configuration-defined context weighting (device posture, zone-origin
/// weight). Deployment-specific; the engine only requires a value in
/// `[0, 1]` per principal.
pub trait ContextProvider: Send + Sync {
    fn context_score(&self, principal_id: &PrincipalId) -> f64;
}

/// Fixed context score for every principal.
pub struct StaticContext(pub f64);

impl ContextProvider for StaticContext {
    fn context_score(&self, _principal_id: &PrincipalId) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

// ─── Configuration ───────────────────────────────────────────────────────

/// Scorer tuning. All fields have serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Weight of the inverted anomaly score in the composite.
    pub behavior_weight: f64,
    /// Weight of the context score in the composite.
    pub context_weight: f64,
    /// Entry thresholds for LOW, BASIC, ELEVATED, HIGH, FULL; a
    /// composite below the first is UNTRUSTED.
    pub band_thresholds: [f64; 5],
    /// Demotion happens only when the composite undershoots the current
    /// band's entry threshold by at least this much.
    pub demotion_margin: f64,
    /// Consecutive evaluations the composite must support a higher band
    /// before one-band promotion.
    pub promotion_dwell: u32,
    /// Re-evaluation cycle; also the assessment validity window.
    pub reeval_interval_secs: i64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            behavior_weight: 0.6,
            context_weight: 0.4,
            band_thresholds: [0.15, 0.35, 0.55, 0.75, 0.90],
            demotion_margin: 0.05,
            promotion_dwell: 2,
            reeval_interval_secs: 30,
        }
    }
}

impl ScorerConfig {
    /// Map a composite score onto its raw trust band.
    pub fn level_for(&self, composite: f64) -> TrustLevel {
        let mut band = 0u8;
        for (i, threshold) in self.band_thresholds.iter().enumerate() {
            if composite >= *threshold {
                band = i as u8 + 1;
            }
        }
        TrustLevel::from_band(band)
    }

    /// The entry threshold of a band; `UNTRUSTED` has none.
    pub fn entry_threshold(&self, level: TrustLevel) -> f64 {
        match level.band() {
            0 => 0.0,
            band => self.band_thresholds[band as usize - 1],
        }
    }
}

/// Band selection with flap resistance, applied against the previous
/// assessment's decayed level.
///
/// - Demotion: only when `composite` undershoots the current band's
///   entry threshold by the margin; then the level drops straight to
///   the raw band.
/// - Promotion: one band at a time, only after the raw band has
///   exceeded the current one for `promotion_dwell` consecutive
///   evaluations.
///
/// Returns the new level and promotion streak.
fn apply_hysteresis(
    current: TrustLevel,
    prev_streak: u32,
    raw: TrustLevel,
    composite: f64,
    config: &ScorerConfig,
) -> (TrustLevel, u32) {
    if raw > current {
        let streak = prev_streak + 1;
        if streak >= config.promotion_dwell {
            let promoted = TrustLevel::from_band(current.band() + 1).min(raw);
            (promoted, 0)
        } else {
            (current, streak)
        }
    } else if raw < current {
        if composite < config.entry_threshold(current) - config.demotion_margin {
            (raw, 0)
        } else {
            (current, 0)
        }
    } else {
        (current, 0)
    }
}

// ─── Trust Scorer ────────────────────────────────────────────────────────

/// The trust scorer. Shared across the periodic tick task, the
/// notification listeners, and request handlers behind an `Arc`.
pub struct TrustScorer {
    ca: Arc<CertificateAuthority>,
    monitor: Arc<BehaviorMonitor>,
    store: Arc<TrustStore>,
    context: Arc<dyn ContextProvider>,
    config: ScorerConfig,
}

impl TrustScorer {
    pub fn new(
        ca: Arc<CertificateAuthority>,
        monitor: Arc<BehaviorMonitor>,
        store: Arc<TrustStore>,
        context: Arc<dyn ContextProvider>,
        config: ScorerConfig,
    ) -> Self {
        Self {
            ca,
            monitor,
            store,
            context,
            config,
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    /// Re-evaluate a principal and commit the new assessment.
    ///
    /// Losers of the version CAS re-read and recompute; persistent
    /// contention surfaces as [`TrustError::CommitContention`].
    pub fn evaluate(&self, principal_id: PrincipalId) -> Result<TrustAssessment, TrustError> {
        for _ in 0..COMMIT_ATTEMPTS {
            let prev = self.store.get(&principal_id);
            let version = prev.as_ref().map(|p| p.version + 1).unwrap_or(1);
            let assessment = self.compute(principal_id, prev.as_ref(), version);

            match self.store.commit(assessment.clone()) {
                Ok(()) => {
                    tracing::debug!(
                        principal = %principal_id,
                        level = %assessment.level,
                        composite = assessment.composite_score,
                        version = assessment.version,
                        "trust assessment committed"
                    );
                    return Ok(assessment);
                }
                Err(TrustError::VersionConflict { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(TrustError::CommitContention(principal_id))
    }

    fn compute(
        &self,
        principal_id: PrincipalId,
        prev: Option<&TrustAssessment>,
        version: u64,
    ) -> TrustAssessment {
        let now = Timestamp::now();
        let expires_at = now.plus_secs(self.config.reeval_interval_secs);
        let anomaly_score = self.monitor.score(&principal_id);
        let maturity = self.monitor.maturity(&principal_id);
        let context_score = self.context.context_score(&principal_id).clamp(0.0, 1.0);

        // Identity failure is absolute.
        if !self.ca.identity_verified(&principal_id) {
            return TrustAssessment {
                principal_id,
                level: TrustLevel::Untrusted,
                identity_score: 0.0,
                anomaly_score,
                context_score,
                composite_score: 0.0,
                maturity,
                version,
                promotion_streak: 0,
                computed_at: now,
                expires_at,
            };
        }

        let composite = (self.config.behavior_weight * (1.0 - anomaly_score)
            + self.config.context_weight * context_score)
            .clamp(0.0, 1.0);
        let mut raw = self.config.level_for(composite);
        // A learning baseline is not evidence enough for full trust.
        if maturity == Maturity::Learning && raw == TrustLevel::Full {
            raw = TrustLevel::High;
        }

        let (level, promotion_streak) = match prev {
            Some(prev) => apply_hysteresis(
                prev.effective_level(now, self.config.reeval_interval_secs),
                prev.promotion_streak,
                raw,
                composite,
                &self.config,
            ),
            None => (raw, 0),
        };

        TrustAssessment {
            principal_id,
            level,
            identity_score: 1.0,
            anomaly_score,
            context_score,
            composite_score: composite,
            maturity,
            version,
            promotion_streak,
            computed_at: now,
            expires_at,
        }
    }
}

// ─── Background Re-evaluation ────────────────────────────────────────────

/// Spawn the scorer's background task: periodic re-evaluation of every
/// known principal, plus immediate re-evaluation on monitor activity
/// and on revocation notices.
///
/// The task exits when `shutdown` flips to `true`; the in-flight
/// evaluation completes first.
pub fn spawn_reevaluation_loop(
    scorer: Arc<TrustScorer>,
    mut activity: tokio::sync::broadcast::Receiver<PrincipalId>,
    mut revocations: tokio::sync::broadcast::Receiver<ztm_ca::RevocationNotice>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let interval_secs = scorer.config.reeval_interval_secs.max(1) as u64;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for principal in scorer.store.principals() {
                        if let Err(err) = scorer.evaluate(principal) {
                            tracing::warn!(%principal, %err, "periodic re-evaluation failed");
                        }
                    }
                }
                notice = activity.recv() => match notice {
                    Ok(principal) => {
                        if let Err(err) = scorer.evaluate(principal) {
                            tracing::warn!(%principal, %err, "activity re-evaluation failed");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "activity notifications lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                notice = revocations.recv() => match notice {
                    Ok(notice) => {
                        let principal = notice.principal_id;
                        if let Err(err) = scorer.evaluate(principal) {
                            tracing::warn!(%principal, %err, "revocation re-evaluation failed");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "revocation notices lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("trust scorer shutting down");
                        break;
                    }
                }
            }
        }
    })
}

// SPDX-License-Identifier: BUSL-1.1
//! # Streaming Behavior Baselines
//!
//! Per-principal exponentially weighted mean/variance per feature, plus
//! the baseline maturity state machine:
//!
//! ```text
//! Learning ──▶ Stable ──▶ DriftDetected ──▶ Stable (restabilized)
//! ```
//!
//! Maturity only moves forward. The sole path back to `Learning` is an
//! explicit [`BehaviorBaseline::reset`], which discards all statistics.
//!
//! ## Drift Handling
//!
//! At stabilization the per-feature variances are snapshotted. If a
//! running variance later exceeds a configured multiple of its snapshot,
//! the baseline enters `DriftDetected` and scoring tolerance is widened
//! until the variance has stayed within bounds for a configured number
//! of consecutive samples, at which point the snapshot is retaken and
//! the baseline restabilizes. This keeps a new benign volume pattern
//! from causing sustained false anomalies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ztm_core::{PrincipalId, Timestamp};

use crate::monitor::MonitorConfig;

/// Floor applied to snapshot variances so the drift comparison never
/// multiplies a near-zero value.
const VARIANCE_FLOOR: f64 = 1e-6;

// ─── Maturity ────────────────────────────────────────────────────────────

/// Baseline maturity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maturity {
    /// Below the minimum sample count. Scoring returns the neutral value.
    Learning,
    /// Enough evidence accumulated; scoring is live.
    Stable,
    /// Running variance exceeded the drift bound; tolerance widened.
    DriftDetected,
}

impl std::fmt::Display for Maturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Learning => "LEARNING",
            Self::Stable => "STABLE",
            Self::DriftDetected => "DRIFT_DETECTED",
        };
        f.write_str(s)
    }
}

// ─── Feature Statistics ──────────────────────────────────────────────────

/// Exponentially weighted mean and variance for a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    pub mean: f64,
    pub variance: f64,
}

impl FeatureStat {
    /// Initialize from the first observation. Variance starts at zero
    /// and is shaped by subsequent updates.
    pub fn from_first(value: f64) -> Self {
        Self {
            mean: value,
            variance: 0.0,
        }
    }

    /// Fold in one observation with decay factor `alpha` in `(0, 1]`.
    pub fn update(&mut self, value: f64, alpha: f64) {
        let diff = value - self.mean;
        let incr = alpha * diff;
        self.mean += incr;
        self.variance = (1.0 - alpha) * (self.variance + diff * incr);
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

// ─── Behavior Baseline ───────────────────────────────────────────────────

/// One principal's streaming baseline. Updated incrementally on each
/// accepted event, never rewound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorBaseline {
    pub principal_id: PrincipalId,
    pub feature_stats: BTreeMap<String, FeatureStat>,
    pub sample_count: u64,
    pub maturity: Maturity,
    pub last_updated: Timestamp,
    /// Anomaly score of the most recently ingested event, if any.
    pub last_score: Option<f64>,
    /// Per-feature variance snapshot taken at (re)stabilization.
    snapshot_variances: BTreeMap<String, f64>,
    /// Consecutive in-bound samples observed while in `DriftDetected`.
    recovery_streak: u32,
}

impl BehaviorBaseline {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            feature_stats: BTreeMap::new(),
            sample_count: 0,
            maturity: Maturity::Learning,
            last_updated: Timestamp::now(),
            last_score: None,
            snapshot_variances: BTreeMap::new(),
            recovery_streak: 0,
        }
    }

    /// Fold one feature vector into the baseline and advance the
    /// maturity state machine. Returns the maturity after the update.
    pub fn observe(
        &mut self,
        features: &BTreeMap<String, f64>,
        config: &MonitorConfig,
    ) -> Maturity {
        for (name, value) in features {
            match self.feature_stats.get_mut(name) {
                Some(stat) => stat.update(*value, config.decay_factor),
                None => {
                    self.feature_stats
                        .insert(name.clone(), FeatureStat::from_first(*value));
                    // Features first seen after stabilization join the
                    // snapshot immediately so they do not trip drift.
                    if self.maturity != Maturity::Learning {
                        self.snapshot_variances.insert(name.clone(), VARIANCE_FLOOR);
                    }
                }
            }
        }
        self.sample_count += 1;
        self.last_updated = Timestamp::now();

        match self.maturity {
            Maturity::Learning => {
                if self.sample_count >= config.min_samples {
                    self.take_snapshot();
                    self.maturity = Maturity::Stable;
                }
            }
            Maturity::Stable => {
                if self.variance_exceeds_bound(config.drift_variance_multiplier) {
                    self.maturity = Maturity::DriftDetected;
                    self.recovery_streak = 0;
                }
            }
            Maturity::DriftDetected => {
                if self.variance_exceeds_bound(config.drift_variance_multiplier) {
                    self.recovery_streak = 0;
                } else {
                    self.recovery_streak += 1;
                    if self.recovery_streak >= config.drift_recovery_samples {
                        self.take_snapshot();
                        self.maturity = Maturity::Stable;
                        self.recovery_streak = 0;
                    }
                }
            }
        }
        self.maturity
    }

    /// Explicit reset: the only transition back to `Learning`. Discards
    /// all accumulated statistics.
    pub fn reset(&mut self) {
        self.feature_stats.clear();
        self.snapshot_variances.clear();
        self.sample_count = 0;
        self.maturity = Maturity::Learning;
        self.recovery_streak = 0;
        self.last_score = None;
        self.last_updated = Timestamp::now();
    }

    pub fn is_mature(&self) -> bool {
        self.maturity != Maturity::Learning
    }

    fn take_snapshot(&mut self) {
        self.snapshot_variances = self
            .feature_stats
            .iter()
            .map(|(name, stat)| (name.clone(), stat.variance.max(VARIANCE_FLOOR)))
            .collect();
    }

    fn variance_exceeds_bound(&self, multiplier: f64) -> bool {
        self.feature_stats.iter().any(|(name, stat)| {
            match self.snapshot_variances.get(name) {
                Some(snapshot) => stat.variance > multiplier * snapshot,
                None => false,
            }
        })
    }
}

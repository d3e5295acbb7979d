// SPDX-License-Identifier: BUSL-1.1
//! # Anomaly Scoring Strategies
//!
//! The monitor scores events through a pluggable [`ScoringStrategy`];
//! the engine supplies one implementation, a weighted z-score aggregate.
//! External deployments may substitute a model-backed strategy as long
//! as it honors the contract below.
//!
//! ## Contract
//!
//! A strategy maps `(baseline, feature vector)` to a score in `[0, 1]`
//! where 0 reads as "indistinguishable from baseline" and 1 as
//! "maximally anomalous". Strategies are pure with respect to the
//! baseline — they never mutate it. Cold-start handling is the
//! monitor's job, not the strategy's: a strategy is only consulted once
//! the baseline is mature.

use std::collections::BTreeMap;

use crate::baseline::{BehaviorBaseline, Maturity};

/// Fixed score returned while a baseline is still learning, and for
/// principals with no baseline at all.
pub const NEUTRAL_ANOMALY_SCORE: f64 = 0.5;

/// Pluggable anomaly scoring. `Send + Sync` so a single strategy can be
/// shared across ingestion workers.
pub trait ScoringStrategy: Send + Sync {
    /// Score `features` against `baseline`, clamped to `[0, 1]`.
    fn score(&self, baseline: &BehaviorBaseline, features: &BTreeMap<String, f64>) -> f64;

    /// Human-readable name for diagnostics/logging.
    fn strategy_name(&self) -> &str;
}

/// Default strategy: mean absolute z-score across the event's features,
/// saturating at `z_saturation` standard deviations.
///
/// Features the baseline has never seen contribute the neutral score —
/// an unknown dimension is weak evidence either way. When the baseline
/// is in `DRIFT_DETECTED`, every z-score is divided by
/// `drift_widening`, widening tolerance until the baseline restabilizes.
#[derive(Debug, Clone)]
pub struct WeightedZScore {
    /// Z-score at which a single feature saturates to 1.0.
    pub z_saturation: f64,
    /// Tolerance widening divisor applied under drift.
    pub drift_widening: f64,
}

impl Default for WeightedZScore {
    fn default() -> Self {
        Self {
            z_saturation: 4.0,
            drift_widening: 1.5,
        }
    }
}

/// Std-dev floor so a perfectly flat baseline does not divide by zero;
/// any deviation from a flat signal saturates instead.
const STD_DEV_FLOOR: f64 = 1e-6;

impl ScoringStrategy for WeightedZScore {
    fn score(&self, baseline: &BehaviorBaseline, features: &BTreeMap<String, f64>) -> f64 {
        if features.is_empty() {
            return NEUTRAL_ANOMALY_SCORE;
        }
        let widening = if baseline.maturity == Maturity::DriftDetected {
            self.drift_widening
        } else {
            1.0
        };

        let mut total = 0.0;
        for (name, value) in features {
            let per_feature = match baseline.feature_stats.get(name) {
                Some(stat) => {
                    let z = (value - stat.mean).abs() / stat.std_dev().max(STD_DEV_FLOOR);
                    ((z / widening) / self.z_saturation).min(1.0)
                }
                None => NEUTRAL_ANOMALY_SCORE,
            };
            total += per_feature;
        }
        (total / features.len() as f64).clamp(0.0, 1.0)
    }

    fn strategy_name(&self) -> &str {
        "WeightedZScore"
    }
}

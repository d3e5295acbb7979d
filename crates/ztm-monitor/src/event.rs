// SPDX-License-Identifier: BUSL-1.1
//! # Telemetry Events
//!
//! The wire-level telemetry event and the immutable scored record it
//! becomes. Feature vectors are open-ended name/value maps; feature
//! names are chosen by the emitting collaborator (e.g. `req_rate`,
//! `bytes_out`, `error_ratio`) and the baseline tracks whatever names
//! it sees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ztm_core::{EventId, PrincipalId, Timestamp};

use crate::error::MonitorError;

/// A telemetry event as delivered by the event bus.
///
/// `event_id` is the de-duplication key: the bus delivers at-least-once,
/// and replayed ids are dropped at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_id: EventId,
    pub principal_id: PrincipalId,
    pub features: BTreeMap<String, f64>,
    pub observed_at: Timestamp,
}

impl TelemetryEvent {
    pub fn new(principal_id: PrincipalId, features: BTreeMap<String, f64>) -> Self {
        Self {
            event_id: EventId::new(),
            principal_id,
            features,
            observed_at: Timestamp::now(),
        }
    }

    /// Structural validation. An event must carry at least one feature
    /// and every value must be finite.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.features.is_empty() {
            return Err(MonitorError::InvalidEvent(format!(
                "event {} has an empty feature vector",
                self.event_id
            )));
        }
        for (name, value) in &self.features {
            if !value.is_finite() {
                return Err(MonitorError::InvalidEvent(format!(
                    "event {} feature {name:?} is not finite",
                    self.event_id
                )));
            }
        }
        Ok(())
    }
}

/// An event after scoring. Immutable once created; appended to the
/// audit log by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub event_id: EventId,
    pub principal_id: PrincipalId,
    pub feature_vector: BTreeMap<String, f64>,
    /// Anomaly score in `[0, 1]`.
    pub score: f64,
    pub timestamp: Timestamp,
}

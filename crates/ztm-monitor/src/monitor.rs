// SPDX-License-Identifier: BUSL-1.1
//! # Behavioral Monitor
//!
//! Owns the per-principal baselines, de-duplicates incoming telemetry,
//! and scores each accepted event against its principal's baseline.
//! [`IngestPool`] shards ingestion by `principal_id` across a fixed set
//! of workers so a given baseline is only ever updated by one worker.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use ztm_core::{EventId, PrincipalId};

use crate::baseline::{BehaviorBaseline, Maturity};
use crate::error::MonitorError;
use crate::event::{AnomalyEvent, TelemetryEvent};
use crate::scoring::{ScoringStrategy, NEUTRAL_ANOMALY_SCORE};

/// How many activity notifications to buffer before slow subscribers lag.
const ACTIVITY_CHANNEL_CAPACITY: usize = 1024;

// ─── Configuration ───────────────────────────────────────────────────────

/// Monitor tuning. All fields have serde defaults so a partial config
/// section is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Exponential decay factor for streaming mean/variance, in `(0, 1]`.
    pub decay_factor: f64,
    /// Samples required before a baseline leaves `LEARNING`.
    pub min_samples: u64,
    /// A running variance above this multiple of its snapshot marks drift.
    pub drift_variance_multiplier: f64,
    /// Consecutive in-bound samples required to leave `DRIFT_DETECTED`.
    pub drift_recovery_samples: u32,
    /// Ingestion pool worker count.
    pub ingest_workers: usize,
    /// Per-worker queue depth.
    pub ingest_queue_depth: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.1,
            min_samples: 20,
            drift_variance_multiplier: 3.0,
            drift_recovery_samples: 10,
            ingest_workers: 4,
            ingest_queue_depth: 1024,
        }
    }
}

// ─── Monitor ─────────────────────────────────────────────────────────────

/// Result of ingesting one telemetry event.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The event was new: scored, folded into the baseline, and an
    /// immutable [`AnomalyEvent`] record produced for the audit log.
    Recorded(AnomalyEvent),
    /// The `event_id` was seen before; nothing changed.
    Duplicate,
}

/// The behavioral monitor.
pub struct BehaviorMonitor {
    config: MonitorConfig,
    strategy: Arc<dyn ScoringStrategy>,
    baselines: DashMap<PrincipalId, BehaviorBaseline>,
    seen_events: DashMap<EventId, ()>,
    activity_tx: tokio::sync::broadcast::Sender<PrincipalId>,
}

impl BehaviorMonitor {
    pub fn new(config: MonitorConfig, strategy: Arc<dyn ScoringStrategy>) -> Self {
        let (activity_tx, _) = tokio::sync::broadcast::channel(ACTIVITY_CHANNEL_CAPACITY);
        Self {
            config,
            strategy,
            baselines: DashMap::new(),
            seen_events: DashMap::new(),
            activity_tx,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Subscribe to per-event activity notifications. The trust scorer
    /// uses these as a re-evaluation trigger; the monitor never calls
    /// the scorer directly.
    pub fn subscribe_activity(&self) -> tokio::sync::broadcast::Receiver<PrincipalId> {
        self.activity_tx.subscribe()
    }

    /// Ingest one telemetry event. Idempotent on `event_id`: a replayed
    /// id returns [`IngestOutcome::Duplicate`] without touching state.
    ///
    /// The event is scored against the baseline as it stood *before*
    /// this event, then folded in. Either both happen or neither does.
    pub fn ingest(&self, event: TelemetryEvent) -> Result<IngestOutcome, MonitorError> {
        event.validate()?;

        if self.seen_events.insert(event.event_id, ()).is_some() {
            tracing::debug!(event = %event.event_id, "duplicate telemetry event dropped");
            return Ok(IngestOutcome::Duplicate);
        }

        let score = {
            let mut baseline = self
                .baselines
                .entry(event.principal_id)
                .or_insert_with(|| BehaviorBaseline::new(event.principal_id));

            let score = if baseline.is_mature() {
                self.strategy.score(&baseline, &event.features)
            } else {
                NEUTRAL_ANOMALY_SCORE
            };

            let before = baseline.maturity;
            let after = baseline.observe(&event.features, &self.config);
            if before != after {
                match after {
                    Maturity::DriftDetected => tracing::warn!(
                        principal = %event.principal_id,
                        "baseline drift detected, widening scoring tolerance"
                    ),
                    _ => tracing::info!(
                        principal = %event.principal_id,
                        from = %before,
                        to = %after,
                        "baseline maturity advanced"
                    ),
                }
            }
            baseline.last_score = Some(score);
            score
        };

        let record = AnomalyEvent {
            event_id: event.event_id,
            principal_id: event.principal_id,
            feature_vector: event.features,
            score,
            timestamp: event.observed_at,
        };
        // No subscribers is fine; notifications are best-effort.
        let _ = self.activity_tx.send(record.principal_id);
        Ok(IngestOutcome::Recorded(record))
    }

    /// Current anomaly score for a principal. Pull-only: never mutates.
    ///
    /// Returns the neutral score for unknown principals and for
    /// baselines still in `LEARNING`.
    pub fn score(&self, principal_id: &PrincipalId) -> f64 {
        match self.baselines.get(principal_id) {
            Some(baseline) if baseline.is_mature() => {
                baseline.last_score.unwrap_or(NEUTRAL_ANOMALY_SCORE)
            }
            _ => NEUTRAL_ANOMALY_SCORE,
        }
    }

    /// Current baseline maturity; `LEARNING` for unknown principals.
    pub fn maturity(&self, principal_id: &PrincipalId) -> Maturity {
        self.baselines
            .get(principal_id)
            .map(|b| b.maturity)
            .unwrap_or(Maturity::Learning)
    }

    /// Snapshot of a principal's baseline, if one exists.
    pub fn baseline(&self, principal_id: &PrincipalId) -> Option<BehaviorBaseline> {
        self.baselines.get(principal_id).map(|b| b.clone())
    }

    /// Explicit reset event: discard a principal's baseline statistics
    /// and return it to `LEARNING`. The only sanctioned maturity regression.
    pub fn reset_baseline(&self, principal_id: &PrincipalId) {
        if let Some(mut baseline) = self.baselines.get_mut(principal_id) {
            baseline.reset();
            tracing::info!(principal = %principal_id, "baseline explicitly reset");
        }
    }
}

// ─── Ingestion Pool ──────────────────────────────────────────────────────

/// Fixed pool of ingestion workers, sharded by `principal_id`.
///
/// Consistent hashing routes every event for a given principal to the
/// same worker, so baseline updates for one principal are serialized
/// without cross-worker locking while distinct principals proceed in
/// parallel. Shutdown drains: queued events are fully ingested before
/// the workers exit.
pub struct IngestPool {
    senders: Vec<tokio::sync::mpsc::Sender<TelemetryEvent>>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl IngestPool {
    /// Spawn the worker tasks. Worker count and queue depth come from
    /// the monitor's config.
    pub fn spawn(monitor: Arc<BehaviorMonitor>) -> Self {
        let workers = monitor.config.ingest_workers.max(1);
        let depth = monitor.config.ingest_queue_depth.max(1);

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let (tx, mut rx) = tokio::sync::mpsc::channel::<TelemetryEvent>(depth);
            let monitor = Arc::clone(&monitor);
            handles.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Err(err) = monitor.ingest(event) {
                        tracing::warn!(worker = worker_id, %err, "event rejected");
                    }
                }
            }));
            senders.push(tx);
        }
        Self { senders, handles }
    }

    /// Route an event to its principal's worker.
    pub async fn dispatch(&self, event: TelemetryEvent) -> Result<(), MonitorError> {
        let shard = shard_for(&event.principal_id, self.senders.len());
        self.senders[shard]
            .send(event)
            .await
            .map_err(|_| MonitorError::ShuttingDown)
    }

    /// Graceful shutdown: close the queues and wait for every worker to
    /// drain its remaining events.
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

fn shard_for(principal_id: &PrincipalId, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    principal_id.as_uuid().hash(&mut hasher);
    (hasher.finish() as usize) % shards
}

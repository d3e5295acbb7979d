// SPDX-License-Identifier: BUSL-1.1
//! # ztm-monitor — Behavioral Monitor
//!
//! Ingests telemetry events, maintains per-principal streaming baselines
//! (exponentially weighted mean/variance per feature), and scores each
//! event's distance from its principal's baseline as an anomaly score in
//! `[0, 1]`.
//!
//! ## Design
//!
//! - **Pull, not push.** Scoring never calls into the trust scorer; the
//!   scorer pulls via [`BehaviorMonitor::score`]. The monitor only emits
//!   an activity notification per accepted event, which the scorer may
//!   subscribe to as a re-evaluation trigger.
//! - **Idempotent ingestion.** Events carry an `event_id`; re-ingesting
//!   a known id is a no-op. At-least-once delivery upstream is safe.
//! - **Cold start is neutral.** Until a baseline reaches the configured
//!   minimum sample count its maturity is `LEARNING` and scoring returns
//!   the fixed neutral value [`NEUTRAL_ANOMALY_SCORE`] — a new principal
//!   is judged neither perfectly trustworthy nor maximally anomalous.
//! - **Principal-partitioned.** The ingestion pool shards events by
//!   `principal_id`, so a given baseline is only ever updated by one
//!   worker. An event either fully updates the baseline or not at all.

pub mod baseline;
pub mod error;
pub mod event;
pub mod monitor;
pub mod scoring;

pub use baseline::{BehaviorBaseline, FeatureStat, Maturity};
pub use error::MonitorError;
pub use event::{AnomalyEvent, TelemetryEvent};
pub use monitor::{BehaviorMonitor, IngestOutcome, IngestPool, MonitorConfig};
pub use scoring::{ScoringStrategy, WeightedZScore, NEUTRAL_ANOMALY_SCORE};

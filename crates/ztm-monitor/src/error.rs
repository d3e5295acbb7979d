// SPDX-License-Identifier: BUSL-1.1
//! Error types for telemetry ingestion.

use thiserror::Error;

/// Errors from the behavioral monitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// The event failed structural validation and was not ingested.
    #[error("invalid telemetry event: {0}")]
    InvalidEvent(String),

    /// The ingestion pool is shutting down and no longer accepts events.
    #[error("monitor is shutting down")]
    ShuttingDown,
}

// SPDX-License-Identifier: BUSL-1.1
//! # Telemetry Ingestion Routes
//!
//! - `POST /v1/telemetry/ingest`       — Ingest one event, report the outcome
//! - `POST /v1/telemetry/ingest/batch` — Fire-and-forget bulk ingestion
//!
//! The single-event path ingests synchronously so the caller learns
//! whether the event was recorded or was a duplicate replay. The batch
//! path dispatches through the sharded worker pool and only promises
//! eventual processing (202).

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ztm_core::{EventId, PrincipalId, Timestamp};
use ztm_monitor::{IngestOutcome, TelemetryEvent};
use ztm_policy::AuditRecord;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Assemble the telemetry router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/telemetry/ingest", post(ingest))
        .route("/v1/telemetry/ingest/batch", post(ingest_batch))
}

/// One telemetry event on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// Client-assigned id; replays of the same id are dropped.
    pub event_id: Uuid,
    pub principal_id: Uuid,
    /// Named numeric features; must be non-empty and finite.
    pub features: BTreeMap<String, f64>,
    /// RFC 3339 UTC instant, `Z`-suffixed.
    pub timestamp: String,
}

impl IngestRequest {
    fn into_event(self) -> Result<TelemetryEvent, AppError> {
        let observed_at = Timestamp::parse(&self.timestamp)
            .map_err(|e| AppError::Validation(format!("invalid timestamp: {e}")))?;
        Ok(TelemetryEvent {
            event_id: EventId(self.event_id),
            principal_id: PrincipalId(self.principal_id),
            features: self.features,
            observed_at,
        })
    }
}

/// Ingestion outcome for a single event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// `recorded` or `duplicate`.
    pub outcome: String,
    /// The anomaly score assigned to the event; absent for duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Batch acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    /// Events accepted for asynchronous processing.
    pub accepted: usize,
}

/// Ingest a single telemetry event.
///
/// De-duplication is by `event_id`: a replay reports `duplicate` and
/// leaves the baseline untouched. Invalid events (empty or non-finite
/// features) are rejected without consuming their id.
#[utoipa::path(
    post,
    path = "/v1/telemetry/ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Ingestion outcome", body = IngestResponse),
        (status = 422, description = "Invalid event"),
    ),
    tag = "telemetry"
)]
pub async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let req = extract_json(body)?;
    let event = req.into_event()?;

    match state.monitor.ingest(event)? {
        IngestOutcome::Recorded(anomaly) => {
            let score = anomaly.score;
            let record = AuditRecord::Anomaly(anomaly);
            state.audit.append(record.clone());
            crate::db::persist_audit(state.db_pool.as_ref(), &record).await;
            Ok(Json(IngestResponse {
                outcome: "recorded".to_string(),
                score: Some(score),
            }))
        }
        IngestOutcome::Duplicate => Ok(Json(IngestResponse {
            outcome: "duplicate".to_string(),
            score: None,
        })),
    }
}

/// Ingest a batch of telemetry events asynchronously.
///
/// Events are dispatched to the sharded worker pool; per-principal
/// ordering is preserved by the shard assignment. Outcomes are not
/// reported — duplicates are silently dropped by the workers.
#[utoipa::path(
    post,
    path = "/v1/telemetry/ingest/batch",
    request_body = Vec<IngestRequest>,
    responses(
        (status = 202, description = "Batch accepted", body = BatchResponse),
        (status = 422, description = "Invalid event in batch"),
        (status = 503, description = "Ingestion pool shutting down"),
    ),
    tag = "telemetry"
)]
pub async fn ingest_batch(
    State(state): State<AppState>,
    body: Result<Json<Vec<IngestRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let batch = extract_json(body)?;

    // Parse the whole batch before dispatching any of it, so a bad
    // entry rejects the batch instead of half-applying it.
    let events = batch
        .into_iter()
        .map(IngestRequest::into_event)
        .collect::<Result<Vec<_>, _>>()?;

    let accepted = events.len();
    match &state.ingest_pool {
        Some(pool) => {
            for event in events {
                pool.dispatch(event).await?;
            }
        }
        // No pool spawned (tests, single-threaded deployments): ingest
        // inline, discarding outcomes like the workers would.
        None => {
            for event in events {
                let _ = state.monitor.ingest(event)?;
            }
        }
    }

    Ok((StatusCode::ACCEPTED, Json(BatchResponse { accepted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use ztm_core::{TrustLevel, Zone, ZoneId};

    fn test_state() -> AppState {
        let mut config = crate::config::AppConfig::default();
        config.zones = vec![Zone::new(ZoneId::new("dmz"), "Perimeter", TrustLevel::Low)];
        AppState::from_config(config).unwrap()
    }

    fn event_json(event_id: Uuid, principal_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "event_id": event_id,
            "principal_id": principal_id,
            "features": {"bytes_out": 120.0, "conn_rate": 3.0},
            "timestamp": "2026-01-01T00:00:00Z"
        })
    }

    async fn post(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn recorded_then_duplicate() {
        let state = test_state();
        let event = event_json(Uuid::new_v4(), Uuid::new_v4());

        let (status, body) = post(
            router().with_state(state.clone()),
            "/v1/telemetry/ingest",
            event.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let first: IngestResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(first.outcome, "recorded");
        assert!(first.score.is_some());

        let (status, body) = post(
            router().with_state(state.clone()),
            "/v1/telemetry/ingest",
            event,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second: IngestResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(second.outcome, "duplicate");
        assert!(second.score.is_none());
    }

    #[tokio::test]
    async fn recorded_event_lands_in_audit_log() {
        let state = test_state();
        let (status, _) = post(
            router().with_state(state.clone()),
            "/v1/telemetry/ingest",
            event_json(Uuid::new_v4(), Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.audit.len(), 1);
    }

    #[tokio::test]
    async fn empty_features_rejected() {
        let state = test_state();
        let body = serde_json::json!({
            "event_id": Uuid::new_v4(),
            "principal_id": Uuid::new_v4(),
            "features": {},
            "timestamp": "2026-01-01T00:00:00Z"
        });
        let (status, _) = post(router().with_state(state), "/v1/telemetry/ingest", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn offset_timestamp_rejected() {
        let state = test_state();
        let body = serde_json::json!({
            "event_id": Uuid::new_v4(),
            "principal_id": Uuid::new_v4(),
            "features": {"bytes_out": 1.0},
            "timestamp": "2026-01-01T00:00:00+00:00"
        });
        let (status, _) = post(router().with_state(state), "/v1/telemetry/ingest", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn batch_dispatches_through_pool() {
        let state = test_state().spawn_ingest_pool();
        let principal = Uuid::new_v4();
        let batch: Vec<serde_json::Value> = (0..8)
            .map(|_| event_json(Uuid::new_v4(), principal))
            .collect();

        let (status, body) = post(
            router().with_state(state.clone()),
            "/v1/telemetry/ingest/batch",
            serde_json::Value::Array(batch),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let ack: BatchResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(ack.accepted, 8);

        // Workers drain asynchronously; poll the baseline briefly.
        let pid = PrincipalId(principal);
        for _ in 0..50 {
            if state
                .monitor
                .baseline(&pid)
                .map(|b| b.sample_count >= 8)
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(state.monitor.baseline(&pid).unwrap().sample_count, 8);
    }

    #[tokio::test]
    async fn batch_with_bad_entry_rejected_whole() {
        let state = test_state();
        let good = event_json(Uuid::new_v4(), Uuid::new_v4());
        let bad = serde_json::json!({
            "event_id": Uuid::new_v4(),
            "principal_id": Uuid::new_v4(),
            "features": {"x": 1.0},
            "timestamp": "not-a-timestamp"
        });
        let (status, _) = post(
            router().with_state(state.clone()),
            "/v1/telemetry/ingest/batch",
            serde_json::Value::Array(vec![good, bad]),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

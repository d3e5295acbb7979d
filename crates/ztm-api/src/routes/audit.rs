// SPDX-License-Identifier: BUSL-1.1
//! # Audit Log Routes
//!
//! - `GET /v1/audit/decisions` — recent policy decisions
//! - `GET /v1/audit/anomalies` — recent scored anomaly events
//!
//! Read-only: dashboards and investigations read here, nothing external
//! ever writes. Records are returned oldest-first within the window.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use ztm_policy::AuditRecord;

use crate::state::AppState;

/// Default page size when `limit` is absent.
const DEFAULT_LIMIT: usize = 100;
/// Hard cap regardless of the requested `limit`.
const MAX_LIMIT: usize = 1000;

/// Assemble the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit/decisions", get(list_decisions))
        .route("/v1/audit/anomalies", get(list_anomalies))
}

/// Pagination parameters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Maximum records to return (capped at 1000).
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

fn filtered(state: &AppState, limit: usize, want_decision: bool) -> Vec<serde_json::Value> {
    state
        .audit
        .recent(state.audit.len())
        .into_iter()
        .filter(|r| matches!(r, AuditRecord::Decision(_)) == want_decision)
        .rev()
        .take(limit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .filter_map(|r| serde_json::to_value(&r).ok())
        .collect()
}

/// List recent policy decisions.
#[utoipa::path(
    get,
    path = "/v1/audit/decisions",
    params(AuditQuery),
    responses(
        (status = 200, description = "Recent decisions, oldest first"),
    ),
    tag = "audit"
)]
pub async fn list_decisions(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<serde_json::Value>> {
    Json(filtered(&state, query.limit(), true))
}

/// List recent scored anomaly events.
#[utoipa::path(
    get,
    path = "/v1/audit/anomalies",
    params(AuditQuery),
    responses(
        (status = 200, description = "Recent anomalies, oldest first"),
    ),
    tag = "audit"
)]
pub async fn list_anomalies(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<serde_json::Value>> {
    Json(filtered(&state, query.limit(), false))
}

// SPDX-License-Identifier: BUSL-1.1
//! # Segmentation Evaluation Route
//!
//! `POST /v1/evaluate` — Should this principal's traffic enter that
//! zone right now?
//!
//! The handler is deliberately thin: the policy engine is infallible by
//! construction, so certificate failures, missing assessments, and
//! store trouble all surface as `Deny`/`Quarantine` decisions with
//! reason codes — never as transport errors.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ztm_core::{PrincipalId, Timestamp, ZoneId};
use ztm_policy::AuditRecord;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Assemble the evaluation router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/evaluate", post(evaluate))
}

/// One cross-zone access question.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// The principal originating the traffic.
    pub source_principal: Uuid,
    /// The zone the traffic wants to enter.
    pub dest_zone: String,
}

/// The enforcement directive.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluateResponse {
    /// `allow`, `deny`, or `quarantine`.
    pub action: String,
    /// Machine-readable reason, e.g. `TRUST_BELOW_THRESHOLD`.
    pub reason_code: String,
    /// The source's effective (decay-adjusted) trust level at decision
    /// time; `UNTRUSTED` when no assessment exists.
    pub trust_level: String,
    /// Seconds the decision may be cached by the enforcement point.
    pub ttl_secs: i64,
    pub decided_at: String,
}

/// Evaluate a cross-zone access request.
#[utoipa::path(
    post,
    path = "/v1/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Enforcement directive", body = EvaluateResponse),
        (status = 422, description = "Malformed request"),
    ),
    tag = "evaluate"
)]
pub async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let req = extract_json(body)?;
    let source = PrincipalId(req.source_principal);
    let dest = ZoneId::new(req.dest_zone);

    let decision = state.engine.evaluate(source, &dest);

    // The decision carries no level; report the source's effective one.
    let now = Timestamp::now();
    let cycle = state.engine.config().assessment_cycle_secs;
    let trust_level = state
        .store
        .get(&source)
        .map(|a| a.effective_level(now, cycle))
        .unwrap_or(ztm_core::TrustLevel::Untrusted);

    crate::db::persist_audit(
        state.db_pool.as_ref(),
        &AuditRecord::Decision(decision.clone()),
    )
    .await;

    Ok(Json(EvaluateResponse {
        action: decision.action.to_string().to_lowercase(),
        reason_code: decision.reason_code.to_string(),
        trust_level: trust_level.to_string(),
        ttl_secs: decision.ttl_secs,
        decided_at: decision.decided_at.to_iso8601(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use ztm_core::{Principal, PrincipalKind, TrustLevel, Zone};

    fn test_state() -> AppState {
        let mut config = crate::config::AppConfig::default();
        let mut dmz = Zone::new(ZoneId::new("dmz"), "Perimeter", TrustLevel::Low);
        let mut internal = Zone::new(ZoneId::new("internal"), "Internal", TrustLevel::Elevated);
        dmz.allowed_peer_zones.push(ZoneId::new("internal"));
        internal.allowed_peer_zones.push(ZoneId::new("dmz"));
        config.zones = vec![dmz, internal];
        AppState::from_config(config).unwrap()
    }

    async fn eval(state: &AppState, source: Uuid, dest: &str) -> EvaluateResponse {
        let app = router().with_state(state.clone());
        let req = Request::builder()
            .method("POST")
            .uri("/v1/evaluate")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({
                    "source_principal": source,
                    "dest_zone": dest
                }))
                .unwrap(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_principal_denied_not_erred() {
        let state = test_state();
        let resp = eval(&state, Uuid::new_v4(), "internal").await;
        assert_eq!(resp.action, "deny");
        assert_eq!(resp.trust_level, "UNTRUSTED");
    }

    #[tokio::test]
    async fn assessed_principal_below_threshold_denied_with_reason() {
        let state = test_state();
        let p = Principal::new(PrincipalKind::Service, ZoneId::new("dmz"));
        let id = p.id;
        state.registry.register(p);

        // No certificate, so identity fails and the assessment lands at
        // UNTRUSTED — below internal's ELEVATED entry bar.
        state.scorer.evaluate(id).unwrap();

        let resp = eval(&state, *id.as_uuid(), "internal").await;
        assert_eq!(resp.action, "deny");
        assert_eq!(resp.reason_code, "TRUST_BELOW_THRESHOLD");
        assert!(resp.ttl_secs > 0);
    }

    #[tokio::test]
    async fn decision_appends_to_audit_log() {
        let state = test_state();
        let before = state.audit.len();
        let _ = eval(&state, Uuid::new_v4(), "internal").await;
        assert_eq!(state.audit.len(), before + 1);
    }

    #[tokio::test]
    async fn malformed_body_is_422() {
        let state = test_state();
        let app = router().with_state(state);
        let req = Request::builder()
            .method("POST")
            .uri("/v1/evaluate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"source_principal": "not-a-uuid"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

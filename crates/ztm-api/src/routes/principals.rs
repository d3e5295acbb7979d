// SPDX-License-Identifier: BUSL-1.1
//! # Principal Provisioning Routes
//!
//! - `POST /v1/principals`     — Register a principal in a zone
//! - `GET  /v1/principals/:id` — Fetch a principal and its trust summary
//!
//! Registration is the front door of the engine: the CA refuses to
//! issue for unregistered ids, and the policy engine cannot place
//! unregistered traffic in any zone.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ztm_core::{Principal, PrincipalId, PrincipalKind, Timestamp, ZoneId};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Assemble the principals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/principals", post(register_principal))
        .route("/v1/principals/:id", get(get_principal))
}

/// Registration request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// `service`, `user`, or `device`.
    #[schema(value_type = String, example = "service")]
    pub kind: PrincipalKind,
    /// The zone the principal resides in. Must exist in the zone table.
    pub zone_id: String,
}

/// A registered principal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub kind: String,
    pub zone_id: String,
    /// Effective trust level; `UNTRUSTED` until first assessment.
    pub trust_level: String,
}

impl PrincipalResponse {
    fn from_principal(state: &AppState, principal: &Principal) -> Self {
        let now = Timestamp::now();
        let cycle = state.engine.config().assessment_cycle_secs;
        let trust_level = state
            .store
            .get(&principal.id)
            .map(|a| a.effective_level(now, cycle))
            .unwrap_or(ztm_core::TrustLevel::Untrusted);
        Self {
            id: *principal.id.as_uuid(),
            kind: principal.kind.to_string(),
            zone_id: principal.zone_id.as_str().to_string(),
            trust_level: trust_level.to_string(),
        }
    }
}

/// Register a principal.
#[utoipa::path(
    post,
    path = "/v1/principals",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Principal registered", body = PrincipalResponse),
        (status = 422, description = "Unknown zone"),
    ),
    tag = "principals"
)]
pub async fn register_principal(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_json(body)?;
    let zone_id = ZoneId::new(req.zone_id);

    if !state.zones.contains(&zone_id) {
        return Err(AppError::Validation(format!(
            "unknown zone: {}",
            zone_id.as_str()
        )));
    }

    let principal = Principal::new(req.kind, zone_id);
    // Ids are freshly generated v4 UUIDs; a collision here would mean a
    // broken RNG, so the false branch is unreachable in practice.
    state.registry.register(principal.clone());

    tracing::info!(
        principal = %principal.id,
        kind = %principal.kind,
        zone = %principal.zone_id,
        "principal registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(PrincipalResponse::from_principal(&state, &principal)),
    ))
}

/// Fetch a principal.
#[utoipa::path(
    get,
    path = "/v1/principals/{id}",
    params(
        ("id" = Uuid, Path, description = "Principal id")
    ),
    responses(
        (status = 200, description = "Principal", body = PrincipalResponse),
        (status = 404, description = "Unknown principal"),
    ),
    tag = "principals"
)]
pub async fn get_principal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PrincipalResponse>, AppError> {
    let principal = state
        .registry
        .get(&PrincipalId(id))
        .ok_or_else(|| AppError::NotFound(format!("unknown principal: {id}")))?;
    Ok(Json(PrincipalResponse::from_principal(&state, &principal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use ztm_core::{TrustLevel, Zone};

    fn test_state() -> AppState {
        let mut config = crate::config::AppConfig::default();
        config.zones = vec![Zone::new(ZoneId::new("dmz"), "Perimeter", TrustLevel::Low)];
        AppState::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn register_then_fetch() {
        let state = test_state();

        let req = Request::builder()
            .method("POST")
            .uri("/v1/principals")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({
                    "kind": "service",
                    "zone_id": "dmz"
                }))
                .unwrap(),
            ))
            .unwrap();
        let resp = router()
            .with_state(state.clone())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: PrincipalResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(created.kind, "SERVICE");
        assert_eq!(created.zone_id, "dmz");
        assert_eq!(created.trust_level, "UNTRUSTED");

        let req = Request::builder()
            .uri(format!("/v1/principals/{}", created.id))
            .body(Body::empty())
            .unwrap();
        let resp = router()
            .with_state(state.clone())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_zone_rejected() {
        let state = test_state();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/principals")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({
                    "kind": "device",
                    "zone_id": "ghost"
                }))
                .unwrap(),
            ))
            .unwrap();
        let resp = router().with_state(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_principal_is_404() {
        let state = test_state();
        let req = Request::builder()
            .uri(format!("/v1/principals/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let resp = router().with_state(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

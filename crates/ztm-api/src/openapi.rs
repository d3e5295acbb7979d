// SPDX-License-Identifier: BUSL-1.1
//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Static bearer token authentication. Set via ZTM_AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ZTM API — Trust Evaluation & Segmentation Engine",
        version = "0.3.0",
        description = "Continuous trust evaluation and zone segmentation enforcement for a zero-trust mesh.\n\nProvides:\n- **Principal provisioning** — the identity registry certificates and decisions hang off\n- **Certificate lifecycle** — issue, rotate, revoke (idempotent), fetch\n- **Telemetry ingestion** — de-duplicated behavioral events, single and batch\n- **Evaluation** — allow/deny/quarantine directives with reason codes\n- **Zone table and audit log** — read-only operational surfaces\n\nAuthentication: Bearer token via `Authorization: Bearer <token>` header.\nAll `/v1/*` endpoints require authentication. Health probes (`/health/*`) and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Evaluation ──────────────────────────────────────────────
        crate::routes::evaluate::evaluate,
        // ── Certificates ────────────────────────────────────────────
        crate::routes::certs::issue_cert,
        crate::routes::certs::rotate_cert,
        crate::routes::certs::revoke_cert,
        crate::routes::certs::get_cert,
        // ── Telemetry ───────────────────────────────────────────────
        crate::routes::telemetry::ingest,
        crate::routes::telemetry::ingest_batch,
        // ── Principals ──────────────────────────────────────────────
        crate::routes::principals::register_principal,
        crate::routes::principals::get_principal,
        // ── Zones ───────────────────────────────────────────────────
        crate::routes::zones::list_zones,
        // ── Audit ───────────────────────────────────────────────────
        crate::routes::audit::list_decisions,
        crate::routes::audit::list_anomalies,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::evaluate::EvaluateRequest,
        crate::routes::evaluate::EvaluateResponse,
        crate::routes::certs::IssueRequest,
        crate::routes::certs::RotateRequest,
        crate::routes::certs::RevokeRequest,
        crate::routes::certs::RevokeResponse,
        crate::routes::certs::CertificateResponse,
        crate::routes::telemetry::IngestRequest,
        crate::routes::telemetry::IngestResponse,
        crate::routes::telemetry::BatchResponse,
        crate::routes::principals::RegisterRequest,
        crate::routes::principals::PrincipalResponse,
        crate::routes::zones::ZoneSummary,
    )),
    tags(
        (name = "evaluate", description = "Cross-zone access evaluation"),
        (name = "certs", description = "Certificate lifecycle"),
        (name = "telemetry", description = "Behavioral telemetry ingestion"),
        (name = "principals", description = "Principal provisioning"),
        (name = "zones", description = "Segmentation topology (read-only)"),
        (name = "audit", description = "Audit log (read-only)"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Router serving the assembled OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

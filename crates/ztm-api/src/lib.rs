// SPDX-License-Identifier: BUSL-1.1
//! # ztm-api — Axum API Service for the Trust Mesh
//!
//! The external HTTP contract over the trust evaluation and
//! segmentation engine: principal provisioning, certificate lifecycle,
//! telemetry ingestion, evaluation, and read-only operational surfaces.
//!
//! ## API Surface
//!
//! | Prefix                  | Module                  | Domain              |
//! |-------------------------|-------------------------|---------------------|
//! | `/v1/evaluate`          | [`routes::evaluate`]    | Access decisions    |
//! | `/v1/certs/*`           | [`routes::certs`]       | Certificate lifecycle |
//! | `/v1/telemetry/*`       | [`routes::telemetry`]   | Behavioral telemetry |
//! | `/v1/principals/*`      | [`routes::principals`]  | Provisioning        |
//! | `/v1/zones`             | [`routes::zones`]       | Topology (read-only) |
//! | `/v1/audit/*`           | [`routes::audit`]       | Audit (read-only)   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes (`/health/*`), `/metrics`, and `/openapi.json` are
//! mounted outside the auth middleware.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Check if metrics are enabled via the `ZTM_METRICS_ENABLED` env var.
/// Defaults to `true` when the variable is absent or set to anything
/// other than `"false"`.
fn metrics_enabled() -> bool {
    std::env::var("ZTM_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`), `/metrics`, and `/openapi.json` are
/// mounted outside the auth middleware so they remain accessible
/// without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    if auth_config.token.is_none() {
        tracing::warn!("no auth token configured — the /v1 surface is unauthenticated");
    }
    let metrics = ApiMetrics::new();
    let metrics_on = metrics_enabled();

    // Authenticated API routes.
    //
    // Body size limit: 2 MiB. Telemetry batches that need more should
    // be split by the client.
    let mut api = Router::new()
        .merge(routes::evaluate::router())
        .merge(routes::certs::router())
        .merge(routes::telemetry::router())
        .merge(routes::principals::router())
        .merge(routes::zones::router())
        .merge(routes::audit::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware));

    // Only register the metrics middleware when metrics are enabled.
    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated probes and the OpenAPI document.
    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router());

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
///
/// Updates domain gauges from current `AppState` on each scrape (pull
/// model), then gathers and encodes all metrics in Prometheus text
/// exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    // -- Update domain gauges from AppState --

    // Principals by kind.
    metrics.principals_total().reset();
    for principal in state.registry.list() {
        metrics
            .principals_total()
            .with_label_values(&[&principal.kind.to_string()])
            .inc();
    }

    // Trust assessments by committed level.
    metrics.trust_assessments_total().reset();
    for principal in state.store.principals() {
        if let Some(assessment) = state.store.get(&principal) {
            metrics
                .trust_assessments_total()
                .with_label_values(&[&assessment.level.to_string()])
                .inc();
        }
    }

    metrics.zones_total().set(state.zones.len() as f64);
    metrics.audit_records_total().set(state.audit.len() as f64);

    // Issuer key provenance: ephemeral unless loaded from environment.
    let ephemeral = std::env::var(state::SIGNING_SEED_VAR).is_err();
    metrics
        .issuer_key_ephemeral()
        .set(if ephemeral { 1.0 } else { 0.0 });

    // -- Gather and encode --
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks:
/// - Issuer signing key is functional (can produce a verifying key).
/// - In-memory stores are accessible.
/// - Database connection is healthy (when configured). An absent pool
///   is in-memory mode and still ready.
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.key_provider.verifying_key() {
        Ok(vk) if vk.to_hex().len() == 64 => {}
        _ => {
            return (StatusCode::SERVICE_UNAVAILABLE, "issuer key degraded").into_response();
        }
    }

    // Verify stores are accessible.
    let _ = state.store.len();
    let _ = state.registry.len();
    let _ = state.audit.len();

    // Verify database connection (when configured).
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}

// SPDX-License-Identifier: BUSL-1.1
//! # End-to-End API Scenario: A Service Earns Trust and Loses It
//!
//! One test function, eight acts, one story: a service principal is
//! provisioned in the edge zone, receives a certificate, builds a
//! behavioral baseline, earns `FULL` trust and an `ALLOW` into the app
//! zone; a telemetry spike demotes it below the internal-db bar; its
//! certificate is revoked mid-session and every later request is denied
//! permanently; a guest principal with perfect trust is still walled
//! off from internal-db by zone adjacency.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use ztm_api::config::AppConfig;
use ztm_api::state::AppState;
use ztm_core::{PrincipalId, Timestamp, TrustLevel, Zone, ZoneId};
use ztm_policy::EnforcementState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Four zones, symmetric adjacency: guest ↔ edge, edge ↔ app,
/// edge ↔ internal-db. guest and internal-db are never adjacent.
fn test_state() -> AppState {
    let mut guest = Zone::new(ZoneId::new("guest"), "Guest", TrustLevel::Low);
    let mut edge = Zone::new(ZoneId::new("edge"), "Edge", TrustLevel::Basic);
    let mut app = Zone::new(ZoneId::new("app"), "Application", TrustLevel::Elevated);
    let mut internal = Zone::new(
        ZoneId::new("internal-db"),
        "Internal DB",
        TrustLevel::Elevated,
    );
    guest.allowed_peer_zones.push(ZoneId::new("edge"));
    edge.allowed_peer_zones.push(ZoneId::new("guest"));
    edge.allowed_peer_zones.push(ZoneId::new("app"));
    app.allowed_peer_zones.push(ZoneId::new("edge"));
    edge.allowed_peer_zones.push(ZoneId::new("internal-db"));
    internal.allowed_peer_zones.push(ZoneId::new("edge"));

    let mut config = AppConfig::default();
    config.zones = vec![guest, edge, app, internal];
    config.zone_context.insert("guest".to_string(), 1.0);
    config.zone_context.insert("edge".to_string(), 1.0);
    AppState::from_config(config).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Provision a principal over HTTP and return its id.
async fn provision(app: &axum::Router, zone: &str) -> Uuid {
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/principals",
            serde_json::json!({"kind": "service", "zone_id": zone}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    body["id"].as_str().unwrap().parse().unwrap()
}

/// Issue and activate a certificate over HTTP, returning its serial.
async fn issue_cert(app: &axum::Router, principal: Uuid) -> Uuid {
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/certs/issue",
            serde_json::json!({"principal_id": principal, "validity_secs": 3600}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "ACTIVE");
    body["serial"].as_str().unwrap().parse().unwrap()
}

/// Ingest one telemetry event over HTTP.
async fn ingest(app: &axum::Router, principal: Uuid, value: f64) {
    let mut features = BTreeMap::new();
    features.insert("req_rate".to_string(), value);
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/telemetry/ingest",
            serde_json::json!({
                "event_id": Uuid::new_v4(),
                "principal_id": principal,
                "features": features,
                "timestamp": Timestamp::now().to_iso8601(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Build a baseline: tight jitter around 50, then one on-baseline event.
async fn mature_baseline(app: &axum::Router, principal: Uuid) {
    for i in 0..40 {
        let jitter = if i % 2 == 0 { 1.0 } else { -1.0 };
        ingest(app, principal, 50.0 + jitter).await;
    }
    ingest(app, principal, 50.0).await;
}

async fn evaluate(app: &axum::Router, principal: Uuid, dest: &str) -> serde_json::Value {
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/evaluate",
            serde_json::json!({"source_principal": principal, "dest_zone": dest}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

// ---------------------------------------------------------------------------
// The Scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_service_earns_and_loses_trust() {
    let state = test_state();
    let app = ztm_api::app(state.clone());

    // The revocation listener is part of the deployed wiring; the
    // scorer is driven explicitly here so each act is deterministic.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let listener = ztm_policy::spawn_revocation_listener(
        state.engine.clone(),
        state.ca.subscribe_revocations(),
        shutdown_rx,
    );

    // =====================================================================
    // Act 1: Provision a service principal in the edge zone.
    // =====================================================================
    let service = provision(&app, "edge").await;
    let pid = PrincipalId(service);

    // =====================================================================
    // Act 2: Issue its certificate. Active immediately.
    // =====================================================================
    let serial = issue_cert(&app, service).await;

    // =====================================================================
    // Act 3: Build a stable behavioral baseline through telemetry.
    // =====================================================================
    mature_baseline(&app, service).await;
    assert!(state.monitor.score(&pid) < 0.2);

    // =====================================================================
    // Act 4: First assessment. Mature baseline, on-baseline traffic,
    // full context weight: the composite lands in the top band.
    // =====================================================================
    let assessment = state.scorer.evaluate(pid).unwrap();
    assert_eq!(assessment.level, TrustLevel::Full);

    // =====================================================================
    // Act 5 (Scenario A): edge → app is adjacent and FULL clears the
    // ELEVATED bar. ALLOW.
    // =====================================================================
    let d = evaluate(&app, service, "app").await;
    assert_eq!(d["action"], "allow");
    assert_eq!(d["reason_code"], "TRUST_SUFFICIENT");
    assert_eq!(d["trust_level"], "FULL");

    // =====================================================================
    // Act 6 (Scenario B): a telemetry spike far outside the baseline
    // demotes the principal below ELEVATED; the next request to
    // internal-db is denied on trust.
    // =====================================================================
    ingest(&app, service, 5000.0).await;
    let demoted = state.scorer.evaluate(pid).unwrap();
    assert!(demoted.level < TrustLevel::Elevated, "got {}", demoted.level);

    let d = evaluate(&app, service, "internal-db").await;
    assert_eq!(d["action"], "deny");
    assert_eq!(d["reason_code"], "TRUST_BELOW_THRESHOLD");

    // =====================================================================
    // Act 7 (Scenario C): revocation mid-session. The notice reaches
    // the policy engine over the broadcast channel; every later
    // request is denied permanently, even to previously allowed zones.
    // =====================================================================
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/certs/revoke",
            serde_json::json!({"serial": serial, "reason": "key_compromise"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["newly_revoked"], true);

    for _ in 0..100 {
        if state.engine.enforcement_state(&pid) == EnforcementState::Revoked {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(state.engine.enforcement_state(&pid), EnforcementState::Revoked);

    let after_revoke = state.scorer.evaluate(pid).unwrap();
    assert_eq!(after_revoke.level, TrustLevel::Untrusted);
    assert_eq!(after_revoke.identity_score, 0.0);

    let d = evaluate(&app, service, "app").await;
    assert_eq!(d["action"], "deny");
    assert_eq!(d["reason_code"], "CERTIFICATE_REVOKED");
    assert_eq!(d["trust_level"], "UNTRUSTED");

    // Permanent: still denied on the next request.
    let d = evaluate(&app, service, "internal-db").await;
    assert_eq!(d["reason_code"], "CERTIFICATE_REVOKED");

    // =====================================================================
    // Act 8 (Scenario D): a guest principal with a certificate, a
    // mature baseline, and top-band trust is still denied entry to
    // internal-db — guest and internal-db are not adjacent.
    // =====================================================================
    let guest = provision(&app, "guest").await;
    issue_cert(&app, guest).await;
    mature_baseline(&app, guest).await;
    let a = state.scorer.evaluate(PrincipalId(guest)).unwrap();
    assert_eq!(a.level, TrustLevel::Full);

    let d = evaluate(&app, guest, "internal-db").await;
    assert_eq!(d["action"], "deny");
    assert_eq!(d["reason_code"], "ZONE_POLICY_VIOLATION");

    // =====================================================================
    // Epilogue: the audit log saw every decision and every anomaly.
    // =====================================================================
    let resp = app.clone().oneshot(get("/v1/audit/decisions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let decisions = body_json(resp).await;
    assert!(decisions.as_array().unwrap().len() >= 5);

    let resp = app.clone().oneshot(get("/v1/audit/anomalies")).await.unwrap();
    let anomalies = body_json(resp).await;
    assert!(!anomalies.as_array().unwrap().is_empty());

    shutdown_tx.send(true).unwrap();
    let _ = listener.await;
}

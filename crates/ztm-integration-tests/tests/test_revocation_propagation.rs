// SPDX-License-Identifier: BUSL-1.1
//! # Revocation Propagation Bound
//!
//! Runs the full deployed wiring — HTTP router, scorer re-evaluation
//! loop, policy revocation listener — and proves that an HTTP
//! revocation is reflected in enforcement within the configured
//! propagation bound. After one explicit priming evaluation, the test
//! only touches the HTTP surface.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use ztm_api::config::AppConfig;
use ztm_api::state::AppState;
use ztm_core::{PrincipalId, TrustLevel, Zone, ZoneId};
use ztm_policy::spawn_revocation_listener;
use ztm_trust::spawn_reevaluation_loop;

fn test_state() -> AppState {
    let mut edge = Zone::new(ZoneId::new("edge"), "Edge", TrustLevel::Basic);
    let mut app = Zone::new(ZoneId::new("app"), "Application", TrustLevel::Basic);
    edge.allowed_peer_zones.push(ZoneId::new("app"));
    app.allowed_peer_zones.push(ZoneId::new("edge"));

    let mut config = AppConfig::default();
    config.zones = vec![edge, app];
    config.zone_context.insert("edge".to_string(), 1.0);
    AppState::from_config(config).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn revocation_visible_within_propagation_bound() {
    let state = test_state();
    let app = ztm_api::app(state.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reeval = spawn_reevaluation_loop(
        state.scorer.clone(),
        state.monitor.subscribe_activity(),
        state.ca.subscribe_revocations(),
        shutdown_rx.clone(),
    );
    let listener = spawn_revocation_listener(
        state.engine.clone(),
        state.ca.subscribe_revocations(),
        shutdown_rx,
    );

    // Provision and certify over HTTP.
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/principals",
            serde_json::json!({"kind": "service", "zone_id": "edge"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let principal: Uuid = body_json(resp).await["id"].as_str().unwrap().parse().unwrap();
    let pid = PrincipalId(principal);

    let resp = app
        .clone()
        .oneshot(post(
            "/v1/certs/issue",
            serde_json::json!({"principal_id": principal, "validity_secs": 3600}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let serial = body_json(resp).await["serial"]
        .as_str()
        .unwrap()
        .to_string();

    // Prime an assessment. Neutral cold-start composite with full edge
    // context lands at ELEVATED, which clears the BASIC bar.
    state.scorer.evaluate(pid).unwrap();

    let d = body_json(
        app.clone()
            .oneshot(post(
                "/v1/evaluate",
                serde_json::json!({"source_principal": principal, "dest_zone": "app"}),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(d["action"], "allow");

    // Revoke over HTTP and measure how long the denial takes to land.
    let bound = Duration::from_secs(state.engine.config().propagation_bound_secs as u64);
    let revoked_at = Instant::now();
    let resp = app
        .clone()
        .oneshot(post(
            "/v1/certs/revoke",
            serde_json::json!({"serial": serial, "reason": "key_compromise"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut denied = false;
    while revoked_at.elapsed() < bound {
        let d = body_json(
            app.clone()
                .oneshot(post(
                    "/v1/evaluate",
                    serde_json::json!({"source_principal": principal, "dest_zone": "app"}),
                ))
                .await
                .unwrap(),
        )
        .await;
        if d["action"] == "deny" {
            assert_eq!(d["reason_code"], "CERTIFICATE_REVOKED");
            denied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(
        denied,
        "revocation not visible within the {}s propagation bound",
        state.engine.config().propagation_bound_secs
    );

    // The scorer loop also observed the notice: the committed
    // assessment collapses to UNTRUSTED.
    for _ in 0..100 {
        if state.store.get(&pid).map(|a| a.level) == Some(TrustLevel::Untrusted) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let assessment = state.store.get(&pid).unwrap();
    assert_eq!(assessment.level, TrustLevel::Untrusted);
    assert_eq!(assessment.identity_score, 0.0);

    shutdown_tx.send(true).unwrap();
    let _ = reeval.await;
    let _ = listener.await;
}

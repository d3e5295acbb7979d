// SPDX-License-Identifier: BUSL-1.1
//! # Certificate Lifecycle Routes
//!
//! - `POST /v1/certs/issue`   — Issue and activate a certificate
//! - `POST /v1/certs/rotate`  — Rotate (supersede) an active certificate
//! - `POST /v1/certs/revoke`  — Revoke a certificate (idempotent)
//! - `GET  /v1/certs/:serial` — Fetch a certificate by serial
//!
//! Rotation is not revocation: the superseded serial fails verification
//! but carries no revocation reason, and the rotation does not trigger
//! trust collapse.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ztm_ca::{Certificate, RevocationReason, SigningKey};
use ztm_core::{CertSerial, PrincipalId};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Assemble the certificate router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/certs/issue", post(issue_cert))
        .route("/v1/certs/rotate", post(rotate_cert))
        .route("/v1/certs/revoke", post(revoke_cert))
        .route("/v1/certs/:serial", get(get_cert))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request to issue a certificate.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueRequest {
    /// The registered principal the certificate is bound to.
    pub principal_id: Uuid,
    /// Validity window length in seconds.
    pub validity_secs: i64,
    /// The subject's Ed25519 public key, hex-encoded. When absent the
    /// authority generates a keypair and returns the secret seed once.
    #[serde(default)]
    pub subject_public_key: Option<String>,
}

/// Request to rotate an active certificate.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RotateRequest {
    pub serial: Uuid,
}

/// Request to revoke a certificate.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub serial: Uuid,
    /// One of `key_compromise`, `cessation_of_operation`,
    /// `privilege_withdrawn`, `unspecified`.
    #[schema(value_type = String, example = "key_compromise")]
    pub reason: RevocationReason,
}

/// Revocation outcome. Revocation is idempotent per serial: repeated
/// requests succeed with `newly_revoked: false`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    pub ok: bool,
    pub newly_revoked: bool,
}

/// Wire form of a certificate.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CertificateResponse {
    pub serial: Uuid,
    pub subject: Uuid,
    pub issuer: String,
    pub subject_public_key: String,
    pub state: String,
    pub not_before: String,
    pub not_after: String,
    pub issued_at: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub revocation_reason: Option<RevocationReason>,
    /// Present only on issuance when the authority generated the
    /// subject keypair. Never stored; never returned again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_secret_seed: Option<String>,
}

impl CertificateResponse {
    fn from_cert(cert: &Certificate) -> Self {
        Self {
            serial: *cert.serial.as_uuid(),
            subject: *cert.subject.as_uuid(),
            issuer: cert.issuer.clone(),
            subject_public_key: cert.subject_public_key.clone(),
            state: cert.state.to_string(),
            not_before: cert.not_before.to_iso8601(),
            not_after: cert.not_after.to_iso8601(),
            issued_at: cert.issued_at.to_iso8601(),
            signature: cert.signature.clone(),
            revocation_reason: cert.revocation_reason,
            subject_secret_seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Issue and activate a certificate for a registered principal.
///
/// Fails with 404 for unknown principals and 409 when the principal
/// already holds an active certificate (rotate instead).
#[utoipa::path(
    post,
    path = "/v1/certs/issue",
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Certificate issued and activated", body = CertificateResponse),
        (status = 404, description = "Principal not registered"),
        (status = 409, description = "Principal already holds an active certificate"),
        (status = 422, description = "Invalid validity window"),
    ),
    tag = "certs"
)]
pub async fn issue_cert(
    State(state): State<AppState>,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_json(body)?;
    let principal_id = PrincipalId(req.principal_id);

    // Reject before issuing when the principal already holds an active
    // cert; otherwise the issued cert would be stranded in ISSUED.
    if state.ca.active_cert(&principal_id).is_some() {
        return Err(AppError::Conflict(format!(
            "{principal_id} already holds an active certificate; rotate it instead"
        )));
    }

    let (public_key_hex, secret_seed) = match req.subject_public_key {
        Some(hex) => (hex, None),
        None => {
            let key = SigningKey::generate(&mut rand_core::OsRng);
            let seed = ztm_ca::ed25519::bytes_to_hex(&key.to_bytes());
            (key.verifying_key().to_hex(), Some(seed))
        }
    };

    let issued = state
        .ca
        .issue(principal_id, req.validity_secs, public_key_hex)?;
    let active = state.ca.activate(issued.serial)?;

    crate::db::persist_certificate(state.db_pool.as_ref(), &active).await;

    tracing::info!(
        principal = %principal_id,
        serial = %active.serial,
        "certificate issued and activated"
    );

    let mut response = CertificateResponse::from_cert(&active);
    response.subject_secret_seed = secret_seed;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Rotate an active certificate: supersede the old serial, issue and
/// activate a replacement with the same validity length.
#[utoipa::path(
    post,
    path = "/v1/certs/rotate",
    request_body = RotateRequest,
    responses(
        (status = 200, description = "Replacement certificate", body = CertificateResponse),
        (status = 404, description = "Unknown serial"),
        (status = 409, description = "Certificate is not active"),
    ),
    tag = "certs"
)]
pub async fn rotate_cert(
    State(state): State<AppState>,
    body: Result<Json<RotateRequest>, JsonRejection>,
) -> Result<Json<CertificateResponse>, AppError> {
    let req = extract_json(body)?;
    let replacement = state.ca.rotate(CertSerial(req.serial))?;

    crate::db::persist_certificate(state.db_pool.as_ref(), &replacement).await;

    tracing::info!(
        old_serial = %req.serial,
        new_serial = %replacement.serial,
        "certificate rotated"
    );

    Ok(Json(CertificateResponse::from_cert(&replacement)))
}

/// Revoke a certificate. Idempotent: revoking a revoked serial is a
/// success that reports `newly_revoked: false` and emits no second
/// notice.
#[utoipa::path(
    post,
    path = "/v1/certs/revoke",
    request_body = RevokeRequest,
    responses(
        (status = 200, description = "Revocation outcome", body = RevokeResponse),
        (status = 404, description = "Unknown serial"),
    ),
    tag = "certs"
)]
pub async fn revoke_cert(
    State(state): State<AppState>,
    body: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<RevokeResponse>, AppError> {
    let req = extract_json(body)?;
    let serial = CertSerial(req.serial);
    let newly_revoked = state.ca.revoke(serial, req.reason)?;

    if newly_revoked {
        if let Some(cert) = state.ca.get(&serial) {
            crate::db::persist_certificate(state.db_pool.as_ref(), &cert).await;
        }
    }

    Ok(Json(RevokeResponse {
        ok: true,
        newly_revoked,
    }))
}

/// Fetch a certificate by serial.
#[utoipa::path(
    get,
    path = "/v1/certs/{serial}",
    params(
        ("serial" = Uuid, Path, description = "Certificate serial")
    ),
    responses(
        (status = 200, description = "Certificate", body = CertificateResponse),
        (status = 404, description = "Unknown serial"),
    ),
    tag = "certs"
)]
pub async fn get_cert(
    State(state): State<AppState>,
    Path(serial): Path<Uuid>,
) -> Result<Json<CertificateResponse>, AppError> {
    let cert = state
        .ca
        .get(&CertSerial(serial))
        .ok_or_else(|| AppError::NotFound(format!("unknown certificate serial: {serial}")))?;
    Ok(Json(CertificateResponse::from_cert(&cert)))
}

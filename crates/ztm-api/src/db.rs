// SPDX-License-Identifier: BUSL-1.1
//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set,
//! the API persists trust state, certificates, and the audit log. When
//! absent, the engine runs in-memory only (development and testing).
//!
//! Persistence is best-effort and asynchronous to the request path:
//! the in-memory stores are authoritative for decisions, writes that
//! fail are logged and never fail the request. Queries use the runtime
//! API (`sqlx::query`), not the compile-time macros, so builds do not
//! need a live database.

use sqlx::postgres::{PgPool, PgPoolOptions};

use ztm_ca::Certificate;
use ztm_policy::AuditRecord;
use ztm_trust::TrustAssessment;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Upsert a certificate row keyed by serial. Best-effort.
pub async fn persist_certificate(pool: Option<&PgPool>, cert: &Certificate) {
    let Some(pool) = pool else { return };
    let result = sqlx::query(
        r#"
        INSERT INTO certificates (serial, subject, state, body)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (serial) DO UPDATE SET state = $3, body = $4
        "#,
    )
    .bind(cert.serial.as_uuid())
    .bind(cert.subject.as_uuid())
    .bind(cert.state.to_string())
    .bind(serde_json::to_value(cert).unwrap_or_default())
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(serial = %cert.serial, error = %e, "certificate persistence failed");
    }
}

/// Upsert the current trust assessment keyed by principal. Best-effort.
pub async fn persist_trust_state(pool: Option<&PgPool>, assessment: &TrustAssessment) {
    let Some(pool) = pool else { return };
    let result = sqlx::query(
        r#"
        INSERT INTO trust_state (principal_id, level, version, body)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (principal_id) DO UPDATE SET level = $2, version = $3, body = $4
        WHERE trust_state.version < $3
        "#,
    )
    .bind(assessment.principal_id.as_uuid())
    .bind(assessment.level.to_string())
    .bind(assessment.version as i64)
    .bind(serde_json::to_value(assessment).unwrap_or_default())
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(
            principal = %assessment.principal_id,
            error = %e,
            "trust state persistence failed"
        );
    }
}

/// Append an audit record. Append-only: no updates, no deletes.
pub async fn persist_audit(pool: Option<&PgPool>, record: &AuditRecord) {
    let Some(pool) = pool else { return };
    let kind = match record {
        AuditRecord::Decision(_) => "decision",
        AuditRecord::Anomaly(_) => "anomaly",
    };
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (kind, recorded_at, body)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(kind)
    .bind(record.recorded_at().to_iso8601())
    .bind(serde_json::to_value(record).unwrap_or_default())
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(kind, error = %e, "audit persistence failed");
    }
}

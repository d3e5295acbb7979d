// SPDX-License-Identifier: BUSL-1.1
//! # Bearer Token Authentication
//!
//! Static bearer token middleware for the `/v1/*` surface. Health
//! probes and `/metrics` are mounted outside this middleware.
//!
//! ## Security Invariant
//!
//! Token comparison uses `subtle::ConstantTimeEq` so response timing
//! does not leak how many prefix bytes of a guessed token matched.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Authentication configuration injected as an axum `Extension`.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables authentication.
    pub token: Option<String>,
}

/// Extract the bearer token from an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

/// Constant-time equality over the token bytes.
fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Middleware enforcing bearer authentication on every request it wraps.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned();

    let expected = match config.and_then(|c| c.token) {
        Some(token) => token,
        // No token configured: authentication disabled.
        None => return next.run(request).await,
    };

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    match presented {
        Some(token) if token_matches(&expected, token) => next.run(request).await,
        Some(_) => AppError::Unauthorized("invalid token".to_string()).into_response(),
        None => AppError::Unauthorized("missing bearer token".to_string()).into_response(),
    }
}

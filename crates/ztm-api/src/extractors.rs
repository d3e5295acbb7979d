// SPDX-License-Identifier: BUSL-1.1
//! Request extraction helpers.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwrap an axum JSON extraction, normalizing rejections to the
/// structured 422 error body instead of axum's plain-text default.
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

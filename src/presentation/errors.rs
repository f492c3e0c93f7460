// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::repositories::scan_job_repository::RepositoryError;
use crate::presentation::middleware::rate_limit_middleware::RateLimitError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口。
/// 原始堆栈和内部细节不会出现在响应体里。
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(RateLimitError::TooManyRequests) = self.0.downcast_ref::<RateLimitError>() {
            let body = Json(json!({
                "error": "Too many requests. Please try again in a minute."
            }));
            return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        }

        let (status, message) = match self.0.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "Scan not found".to_string())
            }
            Some(RepositoryError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            Some(RepositoryError::InvalidState(_)) => (
                StatusCode::CONFLICT,
                "Scan is not in a state that allows this operation".to_string(),
            ),
            Some(RepositoryError::Database(_)) | None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

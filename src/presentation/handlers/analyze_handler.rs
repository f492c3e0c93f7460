// Copyright 2025 scanrs contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use validator::Validate;

use crate::application::dto::analyze_request::AnalyzeRequestDto;
use crate::application::dto::analyze_response::AnalyzeResponseDto;
use crate::application::usecases::submit_scan::{Admission, SubmitError, SubmitScanUseCase};
use crate::infrastructure::repositories::queue_job_repo_impl::QueueJobRepositoryImpl;
use crate::infrastructure::repositories::scan_job_repo_impl::ScanJobRepositoryImpl;
use crate::presentation::middleware::rate_limit_middleware::{RateLimitError, RateLimiter};
use crate::queue::scan_queue::PostgresScanQueue;
use crate::utils::errors::AdmissionError;

/// Concrete use-case wiring used by the HTTP layer.
pub type SubmitScan =
    SubmitScanUseCase<ScanJobRepositoryImpl, PostgresScanQueue<QueueJobRepositoryImpl>>;

pub async fn create_analysis(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(use_case): Extension<Arc<SubmitScan>>,
    Extension(rate_limiter): Extension<Arc<RateLimiter>>,
    Json(payload): Json<AnalyzeRequestDto>,
) -> impl IntoResponse {
    // Rate limit by client identity before any admission work happens.
    let client_id = addr.ip().to_string();
    match rate_limiter.check(&client_id).await {
        Ok(()) => {}
        Err(RateLimitError::TooManyRequests) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please try again in a minute."
                })),
            )
                .into_response();
        }
        Err(RateLimitError::InternalError(e)) => {
            // A broken limiter should not take the service down with it.
            warn!("Rate limiter unavailable, letting request through: {}", e);
        }
    }

    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Invalid request: {}", errors)
            })),
        )
            .into_response();
    }

    let Some(raw_url) = payload.url.as_deref() else {
        let missing = AdmissionError::UrlMissing;
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": missing.client_message(),
                "code": missing.code(),
            })),
        )
            .into_response();
    };

    match use_case.execute(raw_url, None).await {
        Ok(Admission::Accepted(job)) => (
            StatusCode::ACCEPTED,
            Json(AnalyzeResponseDto::accepted(job.id, job.status)),
        )
            .into_response(),
        Ok(Admission::InFlight(job)) => (
            StatusCode::ACCEPTED,
            Json(AnalyzeResponseDto::in_flight(job.id, job.status)),
        )
            .into_response(),
        Ok(Admission::Cached(job)) => (
            StatusCode::OK,
            Json(AnalyzeResponseDto::cached(job.id, job.completed_at)),
        )
            .into_response(),
        Err(SubmitError::Rejected(rejection)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": rejection.client_message(),
                "code": rejection.code(),
            })),
        )
            .into_response(),
        Err(SubmitError::Internal(e)) => {
            error!("Submission failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error"
                })),
            )
                .into_response()
        }
    }
}

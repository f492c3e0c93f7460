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
    extract::{ConnectInfo, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::application::dto::history_query::{HistoryQueryDto, PaginationDto};
use crate::application::dto::scan_status_response::ScanStatusResponseDto;
use crate::domain::repositories::scan_job_repository::{
    RepositoryError, ScanJobFilter, ScanJobRepository,
};
use crate::domain::repositories::scan_result_repository::ScanResultRepository;
use crate::infrastructure::repositories::scan_job_repo_impl::ScanJobRepositoryImpl;
use crate::infrastructure::repositories::scan_result_repo_impl::ScanResultRepositoryImpl;
use crate::presentation::errors::AppError;
use crate::presentation::middleware::rate_limit_middleware::{RateLimitError, RateLimiter};

/// 限流检查：超限拒绝，限流器自身故障放行
async fn enforce_rate_limit(
    rate_limiter: &RateLimiter,
    addr: &SocketAddr,
) -> Result<(), AppError> {
    match rate_limiter.check(&addr.ip().to_string()).await {
        Ok(()) => Ok(()),
        Err(RateLimitError::TooManyRequests) => Err(RateLimitError::TooManyRequests.into()),
        Err(RateLimitError::InternalError(e)) => {
            warn!("Rate limiter unavailable, letting request through: {}", e);
            Ok(())
        }
    }
}

pub async fn get_scan(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    Extension(rate_limiter): Extension<Arc<RateLimiter>>,
    Extension(job_repo): Extension<Arc<ScanJobRepositoryImpl>>,
    Extension(result_repo): Extension<Arc<ScanResultRepositoryImpl>>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&rate_limiter, &addr).await?;

    let job = job_repo
        .find_by_id(id)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    let report = result_repo.find_by_job_id(id).await?;

    let response = ScanStatusResponseDto::from_job(job, report);
    Ok((StatusCode::OK, Json(response)))
}

pub async fn list_scans(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<HistoryQueryDto>,
    Extension(rate_limiter): Extension<Arc<RateLimiter>>,
    Extension(job_repo): Extension<Arc<ScanJobRepositoryImpl>>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&rate_limiter, &addr).await?;

    let filter = ScanJobFilter {
        url: query.url.clone(),
        status: query.status_filter(),
    };

    let page = job_repo.list(filter, query.page(), query.limit()).await?;

    let data: Vec<ScanStatusResponseDto> = page
        .data
        .into_iter()
        .map(|job| ScanStatusResponseDto::from_job(job, None))
        .collect();

    let pagination = PaginationDto {
        page: page.page,
        limit: page.limit,
        total: page.total,
        total_pages: page.total_pages,
        has_next: page.has_next,
        has_prev: page.has_prev,
    };

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "data": data,
            "pagination": pagination,
        })),
    ))
}

pub async fn delete_scan(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    Extension(rate_limiter): Extension<Arc<RateLimiter>>,
    Extension(job_repo): Extension<Arc<ScanJobRepositoryImpl>>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&rate_limiter, &addr).await?;

    // RUNNING任务的删除被仓库层以Conflict拒绝，映射为409
    job_repo.delete(id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "deleted": true, "jobId": id })),
    ))
}

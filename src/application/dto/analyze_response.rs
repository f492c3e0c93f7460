// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::scan_job::ScanStatus;

/// 提交分析响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponseDto {
    pub job_id: Uuid,
    pub status: ScanStatus,
    pub cached: bool,
    pub poll_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalyzeResponseDto {
    /// 新任务已入队
    pub fn accepted(job_id: Uuid, status: ScanStatus) -> Self {
        Self {
            job_id,
            status,
            cached: false,
            poll_url: format!("/scan/{}", job_id),
            cached_at: None,
            message: Some("Scan queued. Poll the status endpoint for results.".to_string()),
        }
    }

    /// 合流到在途任务
    pub fn in_flight(job_id: Uuid, status: ScanStatus) -> Self {
        Self {
            job_id,
            status,
            cached: false,
            poll_url: format!("/scan/{}", job_id),
            cached_at: None,
            message: Some("A scan for this URL is already in progress.".to_string()),
        }
    }

    /// 去重窗口内的缓存命中
    pub fn cached(job_id: Uuid, cached_at: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            job_id,
            status: ScanStatus::Success,
            cached: true,
            poll_url: format!("/scan/{}", job_id),
            cached_at,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_response_shape() {
        let id = Uuid::new_v4();
        let response = AnalyzeResponseDto::cached(id, None);
        assert!(response.cached);
        assert_eq!(response.status, ScanStatus::Success);
        assert_eq!(response.poll_url, format!("/scan/{}", id));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let response = AnalyzeResponseDto::accepted(Uuid::new_v4(), ScanStatus::Pending);
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("jobId").is_some());
        assert!(value.get("pollUrl").is_some());
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["cached"], false);
    }
}

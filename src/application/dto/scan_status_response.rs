// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::scan_job::{ScanJob, ScanStatus};
use crate::domain::models::scan_report::{RiskLevel, ScanReport};

/// 轮询端点的结果载荷
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDto {
    pub score: i32,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub tracker_count: i32,
    pub cookie_count: i32,
    pub external_domain_count: i32,
    pub pages_crawled: i32,
    pub is_https: bool,
    pub has_csp: bool,
    pub canvas_fingerprint: bool,
    pub webgl_fingerprint: bool,
    pub font_fingerprint: bool,
    pub keylogger: bool,
    pub raw_data: serde_json::Value,
}

impl From<ScanReport> for ResultDto {
    fn from(report: ScanReport) -> Self {
        Self {
            score: report.score,
            risk_level: report.risk_level,
            summary: report.summary,
            tracker_count: report.tracker_count,
            cookie_count: report.cookie_count,
            external_domain_count: report.external_domain_count,
            pages_crawled: report.pages_crawled,
            is_https: report.is_https,
            has_csp: report.has_csp,
            canvas_fingerprint: report.canvas_fingerprint,
            webgl_fingerprint: report.webgl_fingerprint,
            font_fingerprint: report.font_fingerprint,
            keylogger: report.keylogger,
            raw_data: report.raw_data,
        }
    }
}

/// 单任务查询响应
///
/// result只在SUCCESS时出现，errorMessage只在FAILED时出现
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusResponseDto {
    pub job_id: Uuid,
    pub target_url: String,
    pub status: ScanStatus,
    pub created_at: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScanStatusResponseDto {
    /// 由任务和可选报告组装响应
    pub fn from_job(job: ScanJob, report: Option<ScanReport>) -> Self {
        let result = match job.status {
            ScanStatus::Success => report.map(ResultDto::from),
            _ => None,
        };
        let error_message = match job.status {
            ScanStatus::Failed => job.error_message.clone(),
            _ => None,
        };

        Self {
            job_id: job.id,
            target_url: job.target_url,
            status: job.status,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            result,
            error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_only_appears_for_success() {
        let job = ScanJob::new("https://example.com/".to_string(), None);
        let response = ScanStatusResponseDto::from_job(job, None);
        assert!(response.result.is_none());
        assert!(response.error_message.is_none());
    }

    #[test]
    fn error_only_appears_for_failed() {
        let job = ScanJob::new("https://example.com/".to_string(), None)
            .start()
            .unwrap()
            .fail("UNREACHABLE:3:https://example.com/")
            .unwrap();

        let response = ScanStatusResponseDto::from_job(job, None);
        assert!(response.result.is_none());
        assert!(response
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("UNREACHABLE"));
    }
}

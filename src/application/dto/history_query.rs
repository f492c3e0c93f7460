// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::domain::models::scan_job::ScanStatus;

/// 历史查询的默认每页条数
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// 历史查询的每页条数上限
pub const MAX_PAGE_LIMIT: u64 = 100;

/// 历史查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQueryDto {
    /// 按目标URL过滤
    pub url: Option<String>,
    /// 按状态过滤
    pub status: Option<String>,
    /// 页号（从1开始）
    pub page: Option<u64>,
    /// 每页条数
    pub limit: Option<u64>,
}

impl HistoryQueryDto {
    /// 解析页号（默认1，最小1）
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// 解析每页条数（默认20，上限100）
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }

    /// 解析状态过滤
    pub fn status_filter(&self) -> Option<ScanStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// 分页元数据
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let query = HistoryQueryDto::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 20);
        assert!(query.status_filter().is_none());
    }

    #[test]
    fn limit_is_capped_at_100() {
        let query = HistoryQueryDto {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(query.limit(), 100);
    }

    #[test]
    fn zero_page_becomes_one() {
        let query = HistoryQueryDto {
            page: Some(0),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn status_filter_parses_case_insensitively() {
        let query = HistoryQueryDto {
            status: Some("SUCCESS".to_string()),
            ..Default::default()
        };
        assert_eq!(query.status_filter(), Some(ScanStatus::Success));
    }
}

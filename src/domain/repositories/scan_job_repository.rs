// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scan_job::{ScanJob, ScanStatus};
use crate::domain::models::scan_report::ScanReport;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 状态冲突（如删除RUNNING任务）
    #[error("Conflict: {0}")]
    Conflict(String),
    /// 非法状态转换
    #[error("Invalid state transition: {0}")]
    InvalidState(String),
}

/// 历史查询过滤条件
#[derive(Debug, Default, Clone)]
pub struct ScanJobFilter {
    /// 按目标URL精确过滤
    pub url: Option<String>,
    /// 按状态过滤
    pub status: Option<ScanStatus>,
}

/// 分页查询结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// 由查询结果和分页参数构造分页响应
    pub fn new(data: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            data,
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// 扫描任务仓库特质
///
/// 定义扫描任务数据访问接口。配对写入（完成状态+结果创建）
/// 必须在单个事务内完成，部分写入被拒绝。
#[async_trait]
pub trait ScanJobRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, job: &ScanJob) -> Result<ScanJob, RepositoryError>;

    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, RepositoryError>;

    /// 查找指定时间后同一URL最近的SUCCESS任务（去重窗口缓存）
    async fn find_recent_success(
        &self,
        url: &str,
        since: DateTime<FixedOffset>,
    ) -> Result<Option<ScanJob>, RepositoryError>;

    /// 查找同一URL当前活跃（PENDING/RUNNING）的任务
    async fn find_active(&self, url: &str) -> Result<Option<ScanJob>, RepositoryError>;

    /// 任务转入RUNNING并记录开始时间
    async fn mark_running(&self, id: Uuid) -> Result<ScanJob, RepositoryError>;

    /// 单事务内创建报告并将任务转入SUCCESS
    ///
    /// 任务不处于RUNNING时拒绝写入，保证幂等完成
    async fn complete_with_report(
        &self,
        job_id: Uuid,
        report: &ScanReport,
    ) -> Result<(), RepositoryError>;

    /// 任务转入FAILED并记录截断后的错误信息
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError>;

    /// 分页查询历史任务
    async fn list(
        &self,
        filter: ScanJobFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<ScanJob>, RepositoryError>;

    /// 删除任务（RUNNING任务拒绝删除并返回Conflict）
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<T: ScanJobRepository + ?Sized> ScanJobRepository for std::sync::Arc<T> {
    async fn create(&self, job: &ScanJob) -> Result<ScanJob, RepositoryError> {
        (**self).create(job).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, RepositoryError> {
        (**self).find_by_id(id).await
    }

    async fn find_recent_success(
        &self,
        url: &str,
        since: DateTime<FixedOffset>,
    ) -> Result<Option<ScanJob>, RepositoryError> {
        (**self).find_recent_success(url, since).await
    }

    async fn find_active(&self, url: &str) -> Result<Option<ScanJob>, RepositoryError> {
        (**self).find_active(url).await
    }

    async fn mark_running(&self, id: Uuid) -> Result<ScanJob, RepositoryError> {
        (**self).mark_running(id).await
    }

    async fn complete_with_report(
        &self,
        job_id: Uuid,
        report: &ScanReport,
    ) -> Result<(), RepositoryError> {
        (**self).complete_with_report(job_id, report).await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        (**self).mark_failed(id, error).await
    }

    async fn list(
        &self,
        filter: ScanJobFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<ScanJob>, RepositoryError> {
        (**self).list(filter, page, limit).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        (**self).delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let page = Page::new(vec![1, 2, 3], 1, 20, 45);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_prev);

        let page = Page::new(vec![1], 3, 20, 45);
        assert!(!page.has_next);
        assert!(page.has_prev);

        let page: Page<i32> = Page::new(vec![], 1, 20, 0);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }
}

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

use crate::domain::models::scan_job::{truncate_error, ScanJob, ScanStatus};
use crate::domain::models::scan_report::ScanReport;
use crate::domain::repositories::scan_job_repository::{
    Page, RepositoryError, ScanJobFilter, ScanJobRepository,
};
use crate::infrastructure::database::entities::{scan_job, scan_result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 扫描任务仓库实现
///
/// 基于SeaORM实现的扫描任务数据访问层
#[derive(Clone)]
pub struct ScanJobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ScanJobRepositoryImpl {
    /// 创建新的扫描任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的扫描任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<scan_job::Model> for ScanJob {
    fn from(model: scan_job::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            target_url: model.target_url,
            status: model.status.parse().unwrap_or_default(),
            error_message: model.error_message,
            started_at: model.started_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<ScanJob> for scan_job::ActiveModel {
    fn from(job: ScanJob) -> Self {
        Self {
            id: Set(job.id),
            user_id: Set(job.user_id),
            target_url: Set(job.target_url.clone()),
            status: Set(job.status.to_string()),
            error_message: Set(job.error_message.clone()),
            started_at: Set(job.started_at),
            completed_at: Set(job.completed_at),
            created_at: Set(job.created_at),
            updated_at: Set(job.updated_at),
        }
    }
}

impl From<ScanReport> for scan_result::ActiveModel {
    fn from(report: ScanReport) -> Self {
        Self {
            id: Set(report.id),
            scan_job_id: Set(report.scan_job_id),
            score: Set(report.score),
            risk_level: Set(report.risk_level.to_string()),
            summary: Set(report.summary.clone()),
            tracker_count: Set(report.tracker_count),
            cookie_count: Set(report.cookie_count),
            external_domain_count: Set(report.external_domain_count),
            pages_crawled: Set(report.pages_crawled),
            is_https: Set(report.is_https),
            has_csp: Set(report.has_csp),
            canvas_fingerprint: Set(report.canvas_fingerprint),
            webgl_fingerprint: Set(report.webgl_fingerprint),
            font_fingerprint: Set(report.font_fingerprint),
            keylogger: Set(report.keylogger),
            raw_data: Set(report.raw_data.clone()),
            created_at: Set(report.created_at),
            updated_at: Set(report.created_at),
        }
    }
}

#[async_trait]
impl ScanJobRepository for ScanJobRepositoryImpl {
    async fn create(&self, job: &ScanJob) -> Result<ScanJob, RepositoryError> {
        let model: scan_job::ActiveModel = job.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanJob>, RepositoryError> {
        let model = scan_job::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_recent_success(
        &self,
        url: &str,
        since: DateTime<FixedOffset>,
    ) -> Result<Option<ScanJob>, RepositoryError> {
        let model = scan_job::Entity::find()
            .filter(scan_job::Column::TargetUrl.eq(url))
            .filter(scan_job::Column::Status.eq(ScanStatus::Success.to_string()))
            .filter(scan_job::Column::CompletedAt.gte(since))
            .order_by_desc(scan_job::Column::CompletedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_active(&self, url: &str) -> Result<Option<ScanJob>, RepositoryError> {
        let model = scan_job::Entity::find()
            .filter(scan_job::Column::TargetUrl.eq(url))
            .filter(
                scan_job::Column::Status.is_in(vec![
                    ScanStatus::Pending.to_string(),
                    ScanStatus::Running.to_string(),
                ]),
            )
            .order_by_desc(scan_job::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn mark_running(&self, id: Uuid) -> Result<ScanJob, RepositoryError> {
        let job: ScanJob = scan_job::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        let running = job
            .start()
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;

        let model: scan_job::ActiveModel = running.clone().into();
        model.update(self.db.as_ref()).await?;
        Ok(running)
    }

    async fn complete_with_report(
        &self,
        job_id: Uuid,
        report: &ScanReport,
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let now: DateTime<FixedOffset> = Utc::now().into();

        // 条件更新保证幂等：只有RUNNING任务可以转入SUCCESS
        let updated = scan_job::Entity::update_many()
            .col_expr(
                scan_job::Column::Status,
                Expr::value(ScanStatus::Success.to_string()),
            )
            .col_expr(scan_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(scan_job::Column::UpdatedAt, Expr::value(now))
            .filter(scan_job::Column::Id.eq(job_id))
            .filter(scan_job::Column::Status.eq(ScanStatus::Running.to_string()))
            .exec(&txn)
            .await?;

        if updated.rows_affected != 1 {
            txn.rollback().await?;
            return Err(RepositoryError::InvalidState(format!(
                "job {} is not running, refusing completion",
                job_id
            )));
        }

        let result_model: scan_result::ActiveModel = report.clone().into();
        result_model.insert(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let updated = scan_job::Entity::update_many()
            .col_expr(
                scan_job::Column::Status,
                Expr::value(ScanStatus::Failed.to_string()),
            )
            .col_expr(
                scan_job::Column::ErrorMessage,
                Expr::value(Some(truncate_error(error))),
            )
            .col_expr(scan_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(scan_job::Column::UpdatedAt, Expr::value(now))
            .filter(scan_job::Column::Id.eq(id))
            .filter(
                scan_job::Column::Status.is_in(vec![
                    ScanStatus::Pending.to_string(),
                    ScanStatus::Running.to_string(),
                ]),
            )
            .exec(self.db.as_ref())
            .await?;

        if updated.rows_affected != 1 {
            return Err(RepositoryError::InvalidState(format!(
                "job {} is not pending/running, refusing failure mark",
                id
            )));
        }

        Ok(())
    }

    async fn list(
        &self,
        filter: ScanJobFilter,
        page: u64,
        limit: u64,
    ) -> Result<Page<ScanJob>, RepositoryError> {
        let mut condition = Condition::all();
        if let Some(url) = &filter.url {
            condition = condition.add(scan_job::Column::TargetUrl.eq(url.clone()));
        }
        if let Some(status) = filter.status {
            condition = condition.add(scan_job::Column::Status.eq(status.to_string()));
        }

        let query = scan_job::Entity::find()
            .filter(condition)
            .order_by_desc(scan_job::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;

        // fetch_page 的页号从0开始，对外从1开始
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        let data = models.into_iter().map(ScanJob::from).collect();

        Ok(Page::new(data, page, limit, total))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let job: ScanJob = scan_job::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        if job.status == ScanStatus::Running {
            return Err(RepositoryError::Conflict(
                "cannot delete a running scan".to_string(),
            ));
        }

        scan_job::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }
}

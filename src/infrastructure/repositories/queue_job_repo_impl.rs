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

use crate::domain::models::queue_job::{DeadLetterJob, QueueJob, QueueJobStatus};
use crate::domain::repositories::queue_job_repository::{QueueDepth, QueueJobRepository};
use crate::domain::repositories::scan_job_repository::RepositoryError;
use crate::infrastructure::database::entities::{dead_letter_job, queue_job};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作器租约时长
const LOCK_DURATION_SECS: i64 = 120;

/// 队列任务仓库实现
///
/// 基于SeaORM实现的持久化队列。抢占使用 `FOR UPDATE SKIP LOCKED`
/// 保证多工作器并发时同一任务只被一个租约持有。
#[derive(Clone)]
pub struct QueueJobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl QueueJobRepositoryImpl {
    /// 创建新的队列任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<queue_job::Model> for QueueJob {
    fn from(model: queue_job::Model) -> Self {
        Self {
            id: model.id,
            url: model.url,
            status: model.status.parse().unwrap_or_default(),
            priority: model.priority,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            scheduled_at: model.scheduled_at,
            lock_token: model.lock_token,
            lock_expires_at: model.lock_expires_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<QueueJob> for queue_job::ActiveModel {
    fn from(job: QueueJob) -> Self {
        Self {
            id: Set(job.id),
            url: Set(job.url.clone()),
            status: Set(job.status.to_string()),
            priority: Set(job.priority),
            attempt_count: Set(job.attempt_count),
            max_attempts: Set(job.max_attempts),
            scheduled_at: Set(job.scheduled_at),
            lock_token: Set(job.lock_token),
            lock_expires_at: Set(job.lock_expires_at),
            completed_at: Set(job.completed_at),
            created_at: Set(job.created_at),
            updated_at: Set(job.updated_at),
        }
    }
}

#[async_trait]
impl QueueJobRepository for QueueJobRepositoryImpl {
    async fn create(&self, job: &QueueJob) -> Result<QueueJob, RepositoryError> {
        let model: queue_job::ActiveModel = job.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn acquire_next(&self, worker_id: Uuid) -> Result<Option<QueueJob>, RepositoryError> {
        let txn = self.db.begin().await?;

        let job = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Queued.to_string()))
            .filter(
                Condition::any()
                    .add(queue_job::Column::ScheduledAt.is_null())
                    .add(queue_job::Column::ScheduledAt.lte(Utc::now())),
            )
            .order_by_desc(queue_job::Column::Priority)
            .order_by_asc(queue_job::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        if let Some(job) = job {
            let mut active: queue_job::ActiveModel = job.into();
            active.lock_token = Set(Some(worker_id));
            active.lock_expires_at =
                Set(Some((Utc::now() + Duration::seconds(LOCK_DURATION_SECS)).into()));
            active.status = Set(QueueJobStatus::Active.to_string());
            active.updated_at = Set(Utc::now().into());

            let updated = active.update(&txn).await?;

            txn.commit().await?;

            return Ok(Some(updated.into()));
        }

        txn.commit().await?;
        Ok(None)
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, RepositoryError> {
        let result = queue_job::Entity::update_many()
            .col_expr(
                queue_job::Column::LockExpiresAt,
                Expr::value(Some(DateTime::<FixedOffset>::from(
                    Utc::now() + Duration::seconds(LOCK_DURATION_SECS),
                ))),
            )
            .col_expr(
                queue_job::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
            )
            .filter(queue_job::Column::Id.eq(job_id))
            .filter(queue_job::Column::LockToken.eq(worker_id))
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Active.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_completed(&self, job_id: Uuid) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        queue_job::Entity::update_many()
            .col_expr(
                queue_job::Column::Status,
                Expr::value(QueueJobStatus::Completed.to_string()),
            )
            .col_expr(queue_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(
                queue_job::Column::LockToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                queue_job::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(queue_job::Column::UpdatedAt, Expr::value(now))
            .filter(queue_job::Column::Id.eq(job_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        queue_job::Entity::update_many()
            .col_expr(
                queue_job::Column::Status,
                Expr::value(QueueJobStatus::Queued.to_string()),
            )
            .col_expr(
                queue_job::Column::AttemptCount,
                Expr::col(queue_job::Column::AttemptCount).add(1),
            )
            .col_expr(
                queue_job::Column::ScheduledAt,
                Expr::value(Some(next_attempt_at)),
            )
            .col_expr(
                queue_job::Column::LockToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                queue_job::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(queue_job::Column::UpdatedAt, Expr::value(now))
            .filter(queue_job::Column::Id.eq(job_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn move_to_dead_letter(
        &self,
        job_id: Uuid,
        dead_letter: &DeadLetterJob,
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let dlq_model = dead_letter_job::ActiveModel {
            id: Set(dead_letter.id),
            original_job_id: Set(dead_letter.original_job_id),
            url: Set(dead_letter.url.clone()),
            error: Set(dead_letter.error.clone()),
            attempts: Set(dead_letter.attempts),
            failed_at: Set(dead_letter.failed_at),
        };
        dlq_model.insert(&txn).await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        queue_job::Entity::update_many()
            .col_expr(
                queue_job::Column::Status,
                Expr::value(QueueJobStatus::Failed.to_string()),
            )
            .col_expr(
                queue_job::Column::AttemptCount,
                Expr::col(queue_job::Column::AttemptCount).add(1),
            )
            .col_expr(queue_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(
                queue_job::Column::LockToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                queue_job::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(queue_job::Column::UpdatedAt, Expr::value(now))
            .filter(queue_job::Column::Id.eq(job_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn reset_stalled(&self) -> Result<u64, RepositoryError> {
        let result = queue_job::Entity::update_many()
            .col_expr(
                queue_job::Column::Status,
                Expr::value(QueueJobStatus::Queued.to_string()),
            )
            .col_expr(
                queue_job::Column::LockToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                queue_job::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(
                queue_job::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
            )
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Active.to_string()))
            .filter(queue_job::Column::LockExpiresAt.lte(Utc::now()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn cleanup_completed(
        &self,
        older_than: DateTime<FixedOffset>,
        keep_last: u64,
    ) -> Result<u64, RepositoryError> {
        // 时长上限
        let by_age = queue_job::Entity::delete_many()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Completed.to_string()))
            .filter(queue_job::Column::CompletedAt.lte(older_than))
            .exec(self.db.as_ref())
            .await?;

        // 数量上限：只保留最近 keep_last 条
        let total = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Completed.to_string()))
            .count(self.db.as_ref())
            .await?;

        let mut by_count = 0u64;
        if total > keep_last {
            let excess = total - keep_last;
            let victims: Vec<Uuid> = queue_job::Entity::find()
                .filter(queue_job::Column::Status.eq(QueueJobStatus::Completed.to_string()))
                .order_by_asc(queue_job::Column::CompletedAt)
                .limit(excess)
                .all(self.db.as_ref())
                .await?
                .into_iter()
                .map(|m| m.id)
                .collect();

            if !victims.is_empty() {
                let result = queue_job::Entity::delete_many()
                    .filter(queue_job::Column::Id.is_in(victims))
                    .exec(self.db.as_ref())
                    .await?;
                by_count = result.rows_affected;
            }
        }

        Ok(by_age.rows_affected + by_count)
    }

    async fn cleanup_failed(
        &self,
        older_than: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError> {
        let result = queue_job::Entity::delete_many()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Failed.to_string()))
            .filter(queue_job::Column::CompletedAt.lte(older_than))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn depth(&self) -> Result<QueueDepth, RepositoryError> {
        let now = Utc::now();

        let waiting = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Queued.to_string()))
            .filter(
                Condition::any()
                    .add(queue_job::Column::ScheduledAt.is_null())
                    .add(queue_job::Column::ScheduledAt.lte(now)),
            )
            .count(self.db.as_ref())
            .await?;

        let delayed = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Queued.to_string()))
            .filter(queue_job::Column::ScheduledAt.gt(now))
            .count(self.db.as_ref())
            .await?;

        let active = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Active.to_string()))
            .count(self.db.as_ref())
            .await?;

        let completed = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Completed.to_string()))
            .count(self.db.as_ref())
            .await?;

        let failed = queue_job::Entity::find()
            .filter(queue_job::Column::Status.eq(QueueJobStatus::Failed.to_string()))
            .count(self.db.as_ref())
            .await?;

        let dead_letter = dead_letter_job::Entity::find()
            .count(self.db.as_ref())
            .await?;

        Ok(QueueDepth {
            waiting,
            active,
            completed,
            failed,
            delayed,
            dead_letter,
        })
    }
}

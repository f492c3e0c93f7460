// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_job::{DeadLetterJob, QueueJob};
use crate::domain::repositories::queue_job_repository::{QueueDepth, QueueJobRepository};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] crate::domain::repositories::scan_job_repository::RepositoryError),
}

/// 扫描队列特质
///
/// 至少一次投递的持久化FIFO队列。精确一次的效果由任务存储层的
/// 状态机拒绝越态转换来兜底，而不是由队列承诺。
#[async_trait]
pub trait ScanQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, job: QueueJob) -> Result<QueueJob, QueueError>;

    /// 出队任务（带租约）
    async fn dequeue(&self, worker_id: Uuid) -> Result<Option<QueueJob>, QueueError>;

    /// 续期租约
    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, QueueError>;

    /// 完成任务
    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// 释放任务以退避重试
    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), QueueError>;

    /// 尝试耗尽，移入死信队列
    async fn dead_letter(&self, job_id: Uuid, record: &DeadLetterJob) -> Result<(), QueueError>;

    /// 队列深度统计
    async fn depth(&self) -> Result<QueueDepth, QueueError>;
}

/// PostgreSQL扫描队列实现
pub struct PostgresScanQueue<R: QueueJobRepository> {
    /// 队列任务仓库
    repository: Arc<R>,
}

impl<R: QueueJobRepository> PostgresScanQueue<R> {
    /// 创建新的PostgreSQL扫描队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 队列任务仓库
    ///
    /// # 返回值
    ///
    /// 返回新的PostgreSQL扫描队列实例
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: QueueJobRepository> ScanQueue for PostgresScanQueue<R> {
    /// 入队任务
    ///
    /// # 参数
    ///
    /// * `job` - 要入队的任务
    ///
    /// # 返回值
    ///
    /// * `Ok(QueueJob)` - 入队成功的任务
    /// * `Err(QueueError)` - 入队失败
    async fn enqueue(&self, job: QueueJob) -> Result<QueueJob, QueueError> {
        let created = self.repository.create(&job).await?;
        Ok(created)
    }

    /// 出队任务
    ///
    /// # 参数
    ///
    /// * `worker_id` - 工作者ID
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(QueueJob))` - 成功出队的任务
    /// * `Ok(None)` - 没有可出队的任务
    /// * `Err(QueueError)` - 出队失败
    async fn dequeue(&self, worker_id: Uuid) -> Result<Option<QueueJob>, QueueError> {
        let job = self.repository.acquire_next(worker_id).await?;
        Ok(job)
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, QueueError> {
        let renewed = self.repository.renew_lease(job_id, worker_id).await?;
        Ok(renewed)
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.repository.mark_completed(job_id).await?;
        Ok(())
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), QueueError> {
        self.repository
            .release_for_retry(job_id, next_attempt_at)
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, job_id: Uuid, record: &DeadLetterJob) -> Result<(), QueueError> {
        self.repository.move_to_dead_letter(job_id, record).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let depth = self.repository.depth().await?;
        Ok(depth)
    }
}

#[async_trait]
impl<T: ScanQueue + ?Sized> ScanQueue for Arc<T> {
    async fn enqueue(&self, job: QueueJob) -> Result<QueueJob, QueueError> {
        (**self).enqueue(job).await
    }

    async fn dequeue(&self, worker_id: Uuid) -> Result<Option<QueueJob>, QueueError> {
        (**self).dequeue(worker_id).await
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, QueueError> {
        (**self).renew_lease(job_id, worker_id).await
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        (**self).complete(job_id).await
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), QueueError> {
        (**self).release_for_retry(job_id, next_attempt_at).await
    }

    async fn dead_letter(&self, job_id: Uuid, record: &DeadLetterJob) -> Result<(), QueueError> {
        (**self).dead_letter(job_id, record).await
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        (**self).depth().await
    }
}

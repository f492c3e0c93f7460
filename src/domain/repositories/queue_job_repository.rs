// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_job::{DeadLetterJob, QueueJob};
use crate::domain::repositories::scan_job_repository::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

/// 队列深度快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueDepth {
    /// 待执行（未到计划时间的除外）
    pub waiting: u64,
    /// 执行中
    pub active: u64,
    /// 已完成（保留期内）
    pub completed: u64,
    /// 已失败（保留期内）
    pub failed: u64,
    /// 延迟/退避中
    pub delayed: u64,
    /// 死信队列
    pub dead_letter: u64,
}

/// 队列任务仓库特质
///
/// 为工作队列提供持久化原语：SKIP LOCKED抢占、租约续期、
/// 失速恢复和保留期清理。
#[async_trait]
pub trait QueueJobRepository: Send + Sync {
    /// 插入一条新的队列记录
    async fn create(&self, job: &QueueJob) -> Result<QueueJob, RepositoryError>;

    /// 抢占下一个可执行任务
    ///
    /// 同优先级内按创建时间FIFO；成功时设置120秒租约。
    /// 抢占本身不消耗尝试计数，失败才消耗（见 `release_for_retry`）。
    async fn acquire_next(&self, worker_id: Uuid) -> Result<Option<QueueJob>, RepositoryError>;

    /// 续期租约（持有者校验）
    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, RepositoryError>;

    /// 标记任务完成并释放租约
    async fn mark_completed(&self, job_id: Uuid) -> Result<(), RepositoryError>;

    /// 释放任务以便重试：消耗一次尝试，回到queued并设置退避时间
    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError>;

    /// 任务尝试耗尽：写入死信记录并标记失败
    async fn move_to_dead_letter(
        &self,
        job_id: Uuid,
        dead_letter: &DeadLetterJob,
    ) -> Result<(), RepositoryError>;

    /// 失速恢复：租约过期的active任务回到queued
    ///
    /// 不消耗尝试计数
    async fn reset_stalled(&self) -> Result<u64, RepositoryError>;

    /// 清理保留期外的完成任务（按时长和数量双重上限）
    async fn cleanup_completed(
        &self,
        older_than: DateTime<FixedOffset>,
        keep_last: u64,
    ) -> Result<u64, RepositoryError>;

    /// 清理保留期外的失败任务
    async fn cleanup_failed(
        &self,
        older_than: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError>;

    /// 队列深度统计
    async fn depth(&self) -> Result<QueueDepth, RepositoryError>;
}

#[async_trait]
impl<T: QueueJobRepository + ?Sized> QueueJobRepository for std::sync::Arc<T> {
    async fn create(&self, job: &QueueJob) -> Result<QueueJob, RepositoryError> {
        (**self).create(job).await
    }

    async fn acquire_next(&self, worker_id: Uuid) -> Result<Option<QueueJob>, RepositoryError> {
        (**self).acquire_next(worker_id).await
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, RepositoryError> {
        (**self).renew_lease(job_id, worker_id).await
    }

    async fn mark_completed(&self, job_id: Uuid) -> Result<(), RepositoryError> {
        (**self).mark_completed(job_id).await
    }

    async fn release_for_retry(
        &self,
        job_id: Uuid,
        next_attempt_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        (**self).release_for_retry(job_id, next_attempt_at).await
    }

    async fn move_to_dead_letter(
        &self,
        job_id: Uuid,
        dead_letter: &DeadLetterJob,
    ) -> Result<(), RepositoryError> {
        (**self).move_to_dead_letter(job_id, dead_letter).await
    }

    async fn reset_stalled(&self) -> Result<u64, RepositoryError> {
        (**self).reset_stalled().await
    }

    async fn cleanup_completed(
        &self,
        older_than: DateTime<FixedOffset>,
        keep_last: u64,
    ) -> Result<u64, RepositoryError> {
        (**self).cleanup_completed(older_than, keep_last).await
    }

    async fn cleanup_failed(
        &self,
        older_than: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError> {
        (**self).cleanup_failed(older_than).await
    }

    async fn depth(&self) -> Result<QueueDepth, RepositoryError> {
        (**self).depth().await
    }
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 队列任务实体
///
/// 工作队列中的一条持久化记录。`id` 与扫描任务ID一致，便于端到端追踪。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    /// 任务标识符（等于扫描任务ID）
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    /// 队列状态
    pub status: QueueJobStatus,
    /// 任务优先级（同级内FIFO）
    pub priority: i32,
    /// 已消耗的尝试次数
    pub attempt_count: i32,
    /// 最大尝试次数
    pub max_attempts: i32,
    /// 延迟执行/重试退避时间
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 租约持有者
    pub lock_token: Option<Uuid>,
    /// 租约到期时间
    pub lock_expires_at: Option<DateTime<FixedOffset>>,
    /// 完成时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 队列任务状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueJobStatus {
    /// 等待执行
    #[default]
    Queued,
    /// 已被租约持有
    Active,
    /// 已完成
    Completed,
    /// 已失败（尝试耗尽）
    Failed,
}

impl fmt::Display for QueueJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueJobStatus::Queued => write!(f, "queued"),
            QueueJobStatus::Active => write!(f, "active"),
            QueueJobStatus::Completed => write!(f, "completed"),
            QueueJobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for QueueJobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(QueueJobStatus::Queued),
            "active" => Ok(QueueJobStatus::Active),
            "completed" => Ok(QueueJobStatus::Completed),
            "failed" => Ok(QueueJobStatus::Failed),
            _ => Err(()),
        }
    }
}

impl QueueJob {
    /// 创建一条新的队列记录
    ///
    /// # 参数
    ///
    /// * `scan_job_id` - 扫描任务ID，同时作为队列任务ID
    /// * `url` - 目标URL
    pub fn new(scan_job_id: Uuid, url: String) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: scan_job_id,
            url,
            status: QueueJobStatus::Queued,
            priority: 0,
            attempt_count: 0,
            max_attempts: 3,
            scheduled_at: None,
            lock_token: None,
            lock_expires_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否还有剩余尝试预算
    pub fn has_attempts_left(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// 死信队列记录
///
/// 尝试耗尽的任务在此留档供运维检查，不再被任何工作器消费
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterJob {
    /// 记录标识符
    pub id: Uuid,
    /// 原扫描任务ID
    pub original_job_id: Uuid,
    /// 目标URL
    pub url: String,
    /// 最后一次失败的错误
    pub error: String,
    /// 已消耗的尝试次数
    pub attempts: i32,
    /// 失败时间
    pub failed_at: DateTime<FixedOffset>,
}

impl DeadLetterJob {
    /// 由耗尽尝试的队列任务构造死信记录
    pub fn from_exhausted(job: &QueueJob, error: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_job_id: job.id,
            url: job.url.clone(),
            error: error.to_string(),
            attempts: job.attempt_count,
            failed_at: Utc::now().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_id_matches_scan_job_id() {
        let scan_id = Uuid::new_v4();
        let job = QueueJob::new(scan_id, "https://example.com/".to_string());
        assert_eq!(job.id, scan_id);
        assert_eq!(job.status, QueueJobStatus::Queued);
        assert_eq!(job.max_attempts, 3);
    }

    #[test]
    fn attempt_budget() {
        let mut job = QueueJob::new(Uuid::new_v4(), "https://example.com/".to_string());
        assert!(job.has_attempts_left());
        job.attempt_count = 3;
        assert!(!job.has_attempts_left());
    }

    #[test]
    fn dead_letter_preserves_provenance() {
        let mut job = QueueJob::new(Uuid::new_v4(), "https://example.com/".to_string());
        job.attempt_count = 3;
        let dlq = DeadLetterJob::from_exhausted(&job, "UNREACHABLE:2:https://example.com/");
        assert_eq!(dlq.original_job_id, job.id);
        assert_eq!(dlq.attempts, 3);
        assert!(dlq.error.starts_with("UNREACHABLE"));
    }
}

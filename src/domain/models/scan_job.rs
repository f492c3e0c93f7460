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

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 错误信息在持久化前的最大长度
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// 扫描任务实体
///
/// 表示一次用户提交的隐私分析任务的完整生命周期
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 所属用户ID（匿名提交时为空）
    pub user_id: Option<Uuid>,
    /// 规范化后的目标URL
    pub target_url: String,
    /// 任务状态
    pub status: ScanStatus,
    /// 错误信息（仅失败任务，截断至1000字符）
    pub error_message: Option<String>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间（仅终态）
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 扫描任务状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// 已入队等待
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 成功完成
    Success,
    /// 失败
    Failed,
}

impl ScanStatus {
    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Success | ScanStatus::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Success => write!(f, "success"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ScanStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "success" => Ok(ScanStatus::Success),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {0}")]
    InvalidStateTransition(ScanStatus),
}

impl fmt::Display for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.status, self.target_url)
    }
}

impl ScanJob {
    /// 创建一个新的扫描任务
    ///
    /// # 参数
    ///
    /// * `target_url` - 规范化后的目标URL
    /// * `user_id` - 所属用户（可空）
    ///
    /// # 返回值
    ///
    /// 返回PENDING状态的新任务
    pub fn new(target_url: String, user_id: Option<Uuid>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            user_id,
            target_url,
            status: ScanStatus::Pending,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 启动任务
    ///
    /// PENDING（或重试中的FAILED）变更为RUNNING
    ///
    /// # 返回值
    ///
    /// * `Ok(ScanJob)` - 成功启动的任务
    /// * `Err(DomainError)` - 状态转换失败
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            // FAILED→RUNNING 仅发生在队列重试同一任务时，终态字段随之清空
            ScanStatus::Pending | ScanStatus::Failed => {
                self.status = ScanStatus::Running;
                self.started_at = Some(Utc::now().into());
                self.completed_at = None;
                self.error_message = None;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    /// 完成任务
    ///
    /// RUNNING变更为SUCCESS并记录完成时间
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            ScanStatus::Running => {
                self.status = ScanStatus::Success;
                self.completed_at = Some(Utc::now().into());
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    /// 标记任务失败
    ///
    /// 错误信息截断至 [`MAX_ERROR_MESSAGE_LEN`]
    pub fn fail(mut self, error: &str) -> Result<Self, DomainError> {
        match self.status {
            ScanStatus::Pending | ScanStatus::Running => {
                self.status = ScanStatus::Failed;
                self.error_message = Some(truncate_error(error));
                self.completed_at = Some(Utc::now().into());
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }
}

/// 按字符边界截断错误信息
pub fn truncate_error(error: &str) -> String {
    if error.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        error.to_string()
    } else {
        error.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_sets_timestamps() {
        let job = ScanJob::new("https://example.com/".to_string(), None);
        assert_eq!(job.status, ScanStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());

        let running = job.start().unwrap();
        assert_eq!(running.status, ScanStatus::Running);
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let done = running.complete().unwrap();
        assert_eq!(done.status, ScanStatus::Success);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn completed_job_cannot_restart() {
        let job = ScanJob::new("https://example.com/".to_string(), None);
        let done = job.start().unwrap().complete().unwrap();
        assert!(done.start().is_err());
    }

    #[test]
    fn failed_job_can_restart_for_retry() {
        let job = ScanJob::new("https://example.com/".to_string(), None);
        let failed = job.start().unwrap().fail("boom").unwrap();
        assert_eq!(failed.status, ScanStatus::Failed);
        assert!(failed.start().is_ok());
    }

    #[test]
    fn error_message_is_truncated() {
        let long_error = "x".repeat(5000);
        let job = ScanJob::new("https://example.com/".to_string(), None);
        let failed = job.start().unwrap().fail(&long_error).unwrap();
        assert_eq!(
            failed.error_message.unwrap().len(),
            MAX_ERROR_MESSAGE_LEN
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ScanStatus::Pending,
            ScanStatus::Running,
            ScanStatus::Success,
            ScanStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ScanStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!ScanStatus::Pending.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
        assert!(ScanStatus::Success.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
    }
}

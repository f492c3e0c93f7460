// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::queue_job_repository::QueueJobRepository;
use chrono::{Duration, Utc};
use metrics::gauge;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

/// 失速检查间隔（秒）
const STALLED_CHECK_INTERVAL_SECS: u64 = 30;

/// 保留期清理间隔（秒）
const CLEANUP_INTERVAL_SECS: u64 = 60;

/// 完成任务的保留时长（2小时）
const COMPLETED_RETENTION_HOURS: i64 = 2;

/// 完成任务的保留数量上限
const COMPLETED_RETENTION_COUNT: u64 = 500;

/// 失败任务的保留时长（24小时）
const FAILED_RETENTION_HOURS: i64 = 24;

/// 队列维护调度器
///
/// 负责失速任务恢复、保留期清理和队列深度指标上报。
/// 实际的任务分发由Worker通过dequeue主动拉取。
pub struct QueueScheduler<R: QueueJobRepository + 'static> {
    /// 队列任务仓库
    repository: Arc<R>,
}

impl<R: QueueJobRepository + 'static> QueueScheduler<R> {
    /// 创建新的队列维护调度器实例
    ///
    /// # 参数
    ///
    /// * `repository` - 队列任务仓库
    ///
    /// # 返回值
    ///
    /// 返回新的队列维护调度器实例
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// 启动失速恢复后台任务
    ///
    /// 每30秒把租约过期的active任务放回队列；失速恢复不消耗尝试计数
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start_stalled_check(&self) -> JoinHandle<()> {
        let repository = self.repository.clone();

        tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(STALLED_CHECK_INTERVAL_SECS));

            loop {
                ticker.tick().await;

                match repository.reset_stalled().await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Re-queued {} stalled jobs", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to reset stalled jobs: {}", e);
                    }
                }
            }
        })
    }

    /// 启动保留期清理后台任务
    ///
    /// 完成任务按2小时/最近500条双重上限清理，失败任务保留24小时。
    /// 同一循环顺带上报队列深度指标。
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start_cleanup(&self) -> JoinHandle<()> {
        let repository = self.repository.clone();

        tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(CLEANUP_INTERVAL_SECS));

            loop {
                ticker.tick().await;

                let completed_cutoff =
                    (Utc::now() - Duration::hours(COMPLETED_RETENTION_HOURS)).into();
                match repository
                    .cleanup_completed(completed_cutoff, COMPLETED_RETENTION_COUNT)
                    .await
                {
                    Ok(count) => {
                        if count > 0 {
                            info!("Removed {} completed queue jobs", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to clean up completed jobs: {}", e);
                    }
                }

                let failed_cutoff = (Utc::now() - Duration::hours(FAILED_RETENTION_HOURS)).into();
                match repository.cleanup_failed(failed_cutoff).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Removed {} failed queue jobs", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to clean up failed jobs: {}", e);
                    }
                }

                match repository.depth().await {
                    Ok(depth) => {
                        gauge!("queue_waiting").set(depth.waiting as f64);
                        gauge!("queue_active").set(depth.active as f64);
                        gauge!("queue_delayed").set(depth.delayed as f64);
                        gauge!("queue_dead_letter").set(depth.dead_letter as f64);
                    }
                    Err(e) => {
                        error!("Failed to read queue depth: {}", e);
                    }
                }
            }
        })
    }
}

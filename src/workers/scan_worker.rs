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

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::queue_job::{DeadLetterJob, QueueJob};
use crate::domain::repositories::scan_job_repository::{RepositoryError, ScanJobRepository};
use crate::domain::services::analysis_service::AnalysisService;
use crate::engines::crawl_engine::CrawlEngine;
use crate::infrastructure::metrics::ProcessMetrics;
use crate::queue::scan_queue::ScanQueue;
use crate::utils::retry_policy::RetryPolicy;

/// 租约续期间隔（必须显著小于锁时长的一半）
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(30);

/// 队列空转时的轮询间隔
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 扫描工作器
///
/// 从队列租约任务，驱动爬取引擎和分析管线，
/// 以单事务写入报告+SUCCESS。
pub struct ScanWorker<J, Q>
where
    J: ScanJobRepository + Send + Sync,
    Q: ScanQueue + Send + Sync,
{
    jobs: Arc<J>,
    queue: Arc<Q>,
    engine: Arc<CrawlEngine>,
    analysis: Arc<AnalysisService>,
    metrics: Arc<ProcessMetrics>,
    retry_policy: RetryPolicy,
    worker_id: Uuid,
}

impl<J, Q> ScanWorker<J, Q>
where
    J: ScanJobRepository + Send + Sync,
    Q: ScanQueue + Send + Sync + 'static,
{
    /// 创建新的扫描工作器实例
    pub fn new(
        jobs: Arc<J>,
        queue: Arc<Q>,
        engine: Arc<CrawlEngine>,
        analysis: Arc<AnalysisService>,
        metrics: Arc<ProcessMetrics>,
    ) -> Self {
        Self {
            jobs,
            queue,
            engine,
            analysis,
            metrics,
            retry_policy: RetryPolicy::default(),
            worker_id: Uuid::new_v4(),
        }
    }

    /// 运行工作器主循环
    ///
    /// 收到关闭信号后完成手头任务再退出（循环间检查，任务内不打断）
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Scan worker {} started", self.worker_id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    error!("Error processing job: {}", e);
                    tokio::select! {
                        _ = sleep(IDLE_POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Scan worker {} stopped", self.worker_id);
    }

    async fn process_next(&self) -> Result<bool> {
        let Some(queue_job) = self.queue.dequeue(self.worker_id).await? else {
            return Ok(false);
        };

        self.process_job(queue_job).await;
        Ok(true)
    }

    #[instrument(skip(self, queue_job), fields(job_id = %queue_job.id, url = %queue_job.url))]
    async fn process_job(&self, queue_job: QueueJob) {
        info!("Processing scan job");
        let started = Instant::now();

        // 租约续期在任务处理期间持续运行
        let renew_task = self.spawn_lease_renewal(queue_job.id);

        // 任务行可能已被外部删除：把载荷当作无操作成功
        match self.jobs.find_by_id(queue_job.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("Scan job {} no longer exists, dropping payload", queue_job.id);
                if let Err(e) = self.queue.complete(queue_job.id).await {
                    error!("Failed to complete orphan queue job: {}", e);
                }
                renew_task.abort();
                return;
            }
            Err(e) => {
                error!("Failed to look up scan job {}: {}", queue_job.id, e);
                self.handle_failure(&queue_job, &format!("job lookup failed: {}", e))
                    .await;
                renew_task.abort();
                return;
            }
        }

        if let Err(e) = self.jobs.mark_running(queue_job.id).await {
            match e {
                RepositoryError::InvalidState(msg) => {
                    // 任务已在别处终结（如陈旧的重复投递），丢弃载荷
                    warn!("Skipping job {}: {}", queue_job.id, msg);
                    if let Err(e) = self.queue.complete(queue_job.id).await {
                        error!("Failed to complete stale queue job: {}", e);
                    }
                }
                other => {
                    error!("Failed to mark job {} running: {}", queue_job.id, other);
                    self.handle_failure(&queue_job, &format!("mark running failed: {}", other))
                        .await;
                }
            }
            renew_task.abort();
            return;
        }

        let outcome = self.crawl_and_analyze(&queue_job).await;
        renew_task.abort();

        let duration = started.elapsed();
        self.metrics.record_duration(duration);

        match outcome {
            Ok(()) => {
                self.metrics.record_succeeded();
                info!("Scan job completed in {:.1}s", duration.as_secs_f64());
            }
            Err(error_message) => {
                self.handle_failure(&queue_job, &error_message).await;
            }
        }
    }

    async fn crawl_and_analyze(&self, queue_job: &QueueJob) -> Result<(), String> {
        let record = self
            .engine
            .crawl(&queue_job.url)
            .await
            .map_err(|e| e.to_string())?;

        let outcome = self.analysis.analyze(&record).await;
        let report = outcome.into_report(queue_job.id);

        // 报告创建与SUCCESS转换在一个事务里，部分写入被拒绝
        self.jobs
            .complete_with_report(queue_job.id, &report)
            .await
            .map_err(|e| format!("completion transaction failed: {}", e))?;

        self.queue
            .complete(queue_job.id)
            .await
            .map_err(|e| format!("queue completion failed: {}", e))?;

        Ok(())
    }

    /// 失败处理：预算内退避重试，预算耗尽转死信并落终态
    async fn handle_failure(&self, queue_job: &QueueJob, error_message: &str) {
        let failed_attempts = queue_job.attempt_count + 1;

        if failed_attempts >= queue_job.max_attempts {
            warn!(
                "Job {} exhausted {} attempts: {}",
                queue_job.id, failed_attempts, error_message
            );

            let mut exhausted = queue_job.clone();
            exhausted.attempt_count = failed_attempts;
            let dead_letter = DeadLetterJob::from_exhausted(&exhausted, error_message);

            if let Err(e) = self.queue.dead_letter(queue_job.id, &dead_letter).await {
                error!("Failed to dead-letter job {}: {}", queue_job.id, e);
            }

            if let Err(e) = self.jobs.mark_failed(queue_job.id, error_message).await {
                error!("Failed to mark job {} failed: {}", queue_job.id, e);
            }

            self.metrics.record_failed();
        } else {
            let next_retry = self
                .retry_policy
                .next_retry_time(failed_attempts as u32, Utc::now());

            if let Err(e) = self
                .queue
                .release_for_retry(queue_job.id, next_retry.into())
                .await
            {
                error!("Failed to release job {} for retry: {}", queue_job.id, e);
                return;
            }

            // 重试间隙任务对外呈现FAILED，重试时经FAILED→RUNNING恢复
            if let Err(e) = self.jobs.mark_failed(queue_job.id, error_message).await {
                error!("Failed to record attempt error on job {}: {}", queue_job.id, e);
            }

            info!(
                "Scheduled retry {}/{} for job {} at {}",
                failed_attempts + 1,
                queue_job.max_attempts,
                queue_job.id,
                next_retry
            );
        }
    }

    fn spawn_lease_renewal(&self, job_id: Uuid) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let worker_id = self.worker_id;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LEASE_RENEW_INTERVAL);
            ticker.tick().await; // 首个tick立即返回，跳过

            loop {
                ticker.tick().await;
                match queue.renew_lease(job_id, worker_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("Lease for job {} no longer held by this worker", job_id);
                        break;
                    }
                    Err(e) => {
                        error!("Lease renewal failed for job {}: {}", job_id, e);
                    }
                }
            }
        })
    }
}

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
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::queue_job::QueueJob;
use crate::domain::models::scan_job::ScanJob;
use crate::domain::repositories::scan_job_repository::ScanJobRepository;
use crate::infrastructure::cache::dedup::{inflight_key, InFlightLock, DEDUP_WINDOW_SECS};
use crate::infrastructure::metrics::ProcessMetrics;
use crate::queue::scan_queue::ScanQueue;
use crate::utils::errors::AdmissionError;
use crate::utils::ssrf::{check_ssrf, HostResolver};
use crate::utils::validators::{hostname_of, validate_scan_url};

/// 准入结果
#[derive(Debug, Clone)]
pub enum Admission {
    /// 新任务已创建并入队
    Accepted(ScanJob),
    /// 合流到同URL的在途任务
    InFlight(ScanJob),
    /// 去重窗口内的缓存命中
    Cached(ScanJob),
}

/// 提交错误类型
#[derive(Error, Debug)]
pub enum SubmitError {
    /// 准入被拒（输入/解析/策略），映射为400
    #[error("{0}")]
    Rejected(#[from] AdmissionError),

    /// 内部错误，映射为500
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 扫描提交用例
///
/// 准入管线：校验 → DNS解析 → SSRF检查 → 两级去重 → 建任务 → 入队。
/// 解析先于任何资源分配；SSRF检查针对解析后的地址。
pub struct SubmitScanUseCase<J, Q>
where
    J: ScanJobRepository,
    Q: ScanQueue,
{
    jobs: Arc<J>,
    queue: Arc<Q>,
    inflight: Arc<dyn InFlightLock>,
    resolver: Arc<dyn HostResolver>,
    metrics: Arc<ProcessMetrics>,
}

impl<J, Q> SubmitScanUseCase<J, Q>
where
    J: ScanJobRepository,
    Q: ScanQueue,
{
    /// 创建新的扫描提交用例实例
    ///
    /// # 参数
    ///
    /// * `jobs` - 扫描任务仓库
    /// * `queue` - 工作队列
    /// * `inflight` - 在途去重锁
    /// * `resolver` - 主机名解析器
    /// * `metrics` - 进程指标
    pub fn new(
        jobs: Arc<J>,
        queue: Arc<Q>,
        inflight: Arc<dyn InFlightLock>,
        resolver: Arc<dyn HostResolver>,
        metrics: Arc<ProcessMetrics>,
    ) -> Self {
        Self {
            jobs,
            queue,
            inflight,
            resolver,
            metrics,
        }
    }

    /// 执行提交
    ///
    /// # 参数
    ///
    /// * `raw_url` - 用户输入的原始URL
    /// * `user_id` - 所属用户（可空）
    ///
    /// # 返回值
    ///
    /// * `Ok(Admission)` - 准入结果（新任务/在途/缓存）
    /// * `Err(SubmitError)` - 拒绝或内部错误
    pub async fn execute(
        &self,
        raw_url: &str,
        user_id: Option<Uuid>,
    ) -> Result<Admission, SubmitError> {
        // A. URL校验与规范化
        let canonical = validate_scan_url(raw_url).map_err(|e| {
            self.metrics.record_validation_error();
            e
        })?;

        let host = hostname_of(&canonical).ok_or_else(|| {
            self.metrics.record_validation_error();
            AdmissionError::UrlInvalidHostname
        })?;

        // B. DNS解析（5秒期限，先于任何资源分配）
        let addr = self.resolver.resolve(&host).await.map_err(|e| {
            self.metrics.record_validation_error();
            e
        })?;

        // C. SSRF检查（针对解析后的地址）
        check_ssrf(&host, addr).map_err(|e| {
            self.metrics.record_ssrf_blocked();
            e
        })?;

        // D1. 去重窗口内的成功任务直接复用
        let window_start: chrono::DateTime<chrono::FixedOffset> =
            (Utc::now() - chrono::Duration::seconds(DEDUP_WINDOW_SECS as i64)).into();
        if let Some(cached) = self
            .jobs
            .find_recent_success(&canonical, window_start)
            .await
            .map_err(|e| SubmitError::Internal(e.to_string()))?
        {
            info!("Dedup cache hit for {} -> job {}", canonical, cached.id);
            self.metrics.record_cached();
            return Ok(Admission::Cached(cached));
        }

        // D2. 在途锁：原子不存在才设置
        let job = ScanJob::new(canonical.clone(), user_id);
        let key = inflight_key(&canonical);
        let acquired = self
            .inflight
            .try_acquire(
                &key,
                &job.id.to_string(),
                Duration::from_secs(DEDUP_WINDOW_SECS),
            )
            .await
            .map_err(|e| SubmitError::Internal(e.to_string()))?;

        if !acquired {
            // 有并发提交在竞争，合流到可见的在途任务
            if let Some(active) = self
                .jobs
                .find_active(&canonical)
                .await
                .map_err(|e| SubmitError::Internal(e.to_string()))?
            {
                info!("Coalesced {} onto in-flight job {}", canonical, active.id);
                return Ok(Admission::InFlight(active));
            }
            // 锁被持有但任务尚不可见，按自己的任务继续入队
        }

        // E. 建任务
        if let Err(e) = self.jobs.create(&job).await {
            if acquired {
                let _ = self.inflight.release(&key).await;
            }
            return Err(SubmitError::Internal(e.to_string()));
        }

        // F. 入队；失败时任务立刻标记失败并释放锁，不留孤儿
        let queue_job = QueueJob::new(job.id, canonical.clone());
        if let Err(e) = self.queue.enqueue(queue_job).await {
            warn!("Enqueue failed for job {}: {}", job.id, e);
            if let Err(mark_err) = self
                .jobs
                .mark_failed(job.id, "Failed to enqueue scan job")
                .await
            {
                warn!("Failed to mark job {} failed: {}", job.id, mark_err);
            }
            if acquired {
                let _ = self.inflight.release(&key).await;
            }
            return Err(SubmitError::Internal(format!(
                "Failed to enqueue scan job: {}",
                e
            )));
        }

        info!("Admitted scan job {} for {}", job.id, canonical);
        self.metrics.record_started();
        Ok(Admission::Accepted(job))
    }
}

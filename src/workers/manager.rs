// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::scan_job_repository::ScanJobRepository;
use crate::domain::services::analysis_service::AnalysisService;
use crate::engines::crawl_engine::CrawlEngine;
use crate::infrastructure::metrics::ProcessMetrics;
use crate::queue::scan_queue::ScanQueue;
use crate::workers::scan_worker::ScanWorker;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
///
/// 启动N个并发扫描工作器并负责优雅关闭：
/// 关闭信号通过watch通道广播，工作器完成手头任务后退出
pub struct WorkerManager<J, Q>
where
    J: ScanJobRepository + Send + Sync + 'static,
    Q: ScanQueue + Send + Sync + 'static,
{
    jobs: Arc<J>,
    queue: Arc<Q>,
    engine: Arc<CrawlEngine>,
    analysis: Arc<AnalysisService>,
    metrics: Arc<ProcessMetrics>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<J, Q> WorkerManager<J, Q>
where
    J: ScanJobRepository + Send + Sync + 'static,
    Q: ScanQueue + Send + Sync + 'static,
{
    pub fn new(
        jobs: Arc<J>,
        queue: Arc<Q>,
        engine: Arc<CrawlEngine>,
        analysis: Arc<AnalysisService>,
        metrics: Arc<ProcessMetrics>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            jobs,
            queue,
            engine,
            analysis,
            metrics,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub async fn start_workers(&mut self, count: usize) {
        info!("Starting {} scan worker(s)", count);

        for _ in 0..count {
            let worker = ScanWorker::new(
                self.jobs.clone(),
                self.queue.clone(),
                self.engine.clone(),
                self.analysis.clone(),
                self.metrics.clone(),
            );

            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(async move {
                worker.run(shutdown_rx).await;
            });
            self.handles.push(handle);
        }
    }

    /// 等待关闭信号并优雅关闭工作进程
    ///
    /// 工作器完成手头任务后才退出，队列/数据库连接随进程释放
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown().await;
    }

    /// 广播关闭并等待所有工作器退出
    pub async fn shutdown(&mut self) {
        info!("Shutting down workers...");
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Worker task join failed: {}", e);
            }
        }

        info!("Workers shut down successfully");
    }
}

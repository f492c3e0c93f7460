// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::http::{HeaderValue, Method};
use axum::Extension;
use scanrs::application::usecases::submit_scan::SubmitScanUseCase;
use scanrs::config::settings::Settings;
use scanrs::domain::services::analysis_service::AnalysisService;
use scanrs::engines::crawl_engine::CrawlEngine;
use scanrs::infrastructure::cache::dedup::RedisInFlightLock;
use scanrs::infrastructure::cache::redis_client::RedisClient;
use scanrs::infrastructure::database::connection;
use scanrs::infrastructure::metrics::ProcessMetrics;
use scanrs::infrastructure::repositories::queue_job_repo_impl::QueueJobRepositoryImpl;
use scanrs::infrastructure::repositories::scan_job_repo_impl::ScanJobRepositoryImpl;
use scanrs::infrastructure::repositories::scan_result_repo_impl::ScanResultRepositoryImpl;
use scanrs::presentation::middleware::rate_limit_middleware::RateLimiter;
use scanrs::presentation::routes;
use scanrs::queue::scan_queue::PostgresScanQueue;
use scanrs::queue::scheduler::QueueScheduler;
use scanrs::utils::telemetry;
use scanrs::workers::manager::WorkerManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 初始化日志（生产环境输出JSON）
    let production = std::env::var("APP_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false);
    telemetry::init_telemetry(production);
    info!("Starting scanrs...");

    // 初始化 Prometheus 指标收集
    scanrs::infrastructure::metrics::init_metrics();

    // 2. 加载应用程序配置
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded (service: {})", settings.service.name);

    // 3. 建立数据库连接并运行迁移
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. 初始化 Redis 客户端
    let redis_client = RedisClient::new(&settings.redis.url).await?;
    info!("Redis client initialized");

    // 5. 初始化速率限制器
    let rate_limiter = Arc::new(RateLimiter::new(
        redis_client.clone(),
        settings.rate_limiting.default_rpm,
        settings.rate_limiting.enabled,
    ));

    // 6. 初始化核心组件
    let job_repo = Arc::new(ScanJobRepositoryImpl::new(db.clone()));
    let result_repo = Arc::new(ScanResultRepositoryImpl::new(db.clone()));
    let queue_repo = Arc::new(QueueJobRepositoryImpl::new(db.clone()));
    let queue = Arc::new(PostgresScanQueue::new(queue_repo.clone()));
    let inflight = Arc::new(RedisInFlightLock::new(redis_client.clone()));
    let process_metrics = Arc::new(ProcessMetrics::new());

    let submit_use_case = Arc::new(SubmitScanUseCase::new(
        job_repo.clone(),
        queue.clone(),
        inflight,
        Arc::new(scanrs::utils::ssrf::SystemResolver),
        process_metrics.clone(),
    ));

    let crawl_engine = Arc::new(CrawlEngine::new());
    let analysis_service = Arc::new(AnalysisService::new());

    // 7. 根据启动参数选择服务类型
    let args: Vec<String> = std::env::args().collect();
    let service_type = args.get(1).map(String::as_str).unwrap_or("api");

    match service_type {
        "api" => {
            info!("Starting API service with embedded workers...");

            // 队列维护：失速恢复与保留期清理
            let scheduler = QueueScheduler::new(queue_repo.clone());
            let stalled_task = scheduler.start_stalled_check();
            let cleanup_task = scheduler.start_cleanup();

            // 内嵌工作器池
            let mut worker_manager = WorkerManager::new(
                job_repo.clone(),
                queue.clone(),
                crawl_engine.clone(),
                analysis_service.clone(),
                process_metrics.clone(),
            );
            worker_manager
                .start_workers(settings.worker.concurrency)
                .await;

            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_origin(settings.server.cors_origin.parse::<HeaderValue>()?);

            let app = routes::routes()
                .layer(cors)
                .layer(Extension(submit_use_case))
                .layer(Extension(rate_limiter))
                .layer(Extension(job_repo))
                .layer(Extension(result_repo))
                .layer(Extension(queue))
                .layer(Extension(db))
                .layer(Extension(redis_client))
                .layer(Extension(process_metrics))
                .layer(Extension(settings.clone()));

            let addr = format!("{}:{}", settings.server.host, settings.server.port);
            let listener = TcpListener::bind(&addr).await?;
            info!("Server listening on {}", addr);

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Unable to listen for shutdown signal: {}", e);
                }
                info!("Shutdown signal received");
            })
            .await?;

            // HTTP停止后等工作器清空手头任务
            worker_manager.shutdown().await;
            stalled_task.abort();
            cleanup_task.abort();
        }
        "worker" => {
            info!("Starting Worker service...");

            let scheduler = QueueScheduler::new(queue_repo.clone());
            let _stalled_task = scheduler.start_stalled_check();
            let _cleanup_task = scheduler.start_cleanup();

            let mut worker_manager = WorkerManager::new(
                job_repo,
                queue,
                crawl_engine,
                analysis_service,
                process_metrics,
            );
            worker_manager
                .start_workers(settings.worker.concurrency)
                .await;

            worker_manager.wait_for_shutdown().await;
        }
        _ => {
            error!(
                "Invalid service type: '{}'. Use 'api' or 'worker'.",
                service_type
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

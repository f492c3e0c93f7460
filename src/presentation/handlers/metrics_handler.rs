// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};
use tracing::warn;

use crate::config::settings::Settings;
use crate::infrastructure::metrics::ProcessMetrics;
use crate::infrastructure::repositories::queue_job_repo_impl::QueueJobRepositoryImpl;
use crate::queue::scan_queue::{PostgresScanQueue, ScanQueue};

/// 指标端点
///
/// 返回进程计数器、耗时直方图、队列深度、运行时长和内存
pub async fn metrics(
    Extension(process_metrics): Extension<Arc<ProcessMetrics>>,
    Extension(queue): Extension<Arc<PostgresScanQueue<QueueJobRepositoryImpl>>>,
    Extension(settings): Extension<Arc<Settings>>,
) -> impl IntoResponse {
    let mut body = process_metrics.snapshot();

    match queue.depth().await {
        Ok(depth) => {
            body["queueDepth"] = serde_json::to_value(&depth).unwrap_or_default();
        }
        Err(e) => {
            warn!("Queue depth unavailable for metrics: {}", e);
            body["queueDepth"] = serde_json::Value::Null;
        }
    }

    body["service"] = serde_json::Value::String(settings.service.name.clone());

    Json(body)
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::infrastructure::cache::redis_client::RedisClient;

/// 健康检查端点
///
/// 任一依赖不健康时整体降级为503
pub async fn health(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(redis): Extension<RedisClient>,
) -> impl IntoResponse {
    let database_up = match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Database health check failed: {}", e);
            false
        }
    };

    let redis_up = match redis.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Redis health check failed: {}", e);
            false
        }
    };

    let healthy = database_up && redis_up;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "ok" } else { "degraded" },
            "dependencies": {
                "database": if database_up { "up" } else { "down" },
                "redis": if redis_up { "up" } else { "down" },
            },
        })),
    )
}

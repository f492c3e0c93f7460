// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::{
    analyze_handler, health_handler, metrics_handler, scan_handler,
};
use axum::{
    routing::{delete, get, post},
    Router,
};

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由（依赖通过Extension层注入）
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_handler::health))
        .route("/metrics", get(metrics_handler::metrics))
        .route("/version", get(version));

    let api_routes = Router::new()
        .route("/analyze", post(analyze_handler::create_analysis))
        .route("/scan/{id}", get(scan_handler::get_scan))
        .route("/scan/{id}", delete(scan_handler::delete_scan))
        .route("/scans", get(scan_handler::list_scans));

    Router::new().merge(public_routes).merge(api_routes)
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

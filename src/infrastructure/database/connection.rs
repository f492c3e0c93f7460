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

use crate::config::settings::DatabaseSettings;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

/// 连接的最长存活时间（定期轮换，避免长连接积累状态）
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(3600);

/// 根据数据库配置建立连接池
///
/// 池参数全部来自 [`DatabaseSettings`]：未配置的项沿用SeaORM默认值。
/// 扫描任务的写入路径（队列抢占、报告落库）都走这个池，
/// acquire超时与connect超时保持一致，避免抢占路径被无限挂起。
///
/// # 参数
///
/// * `settings` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 就绪的连接池
/// * `Err(DbErr)` - 连接失败
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(settings.url.to_owned());

    if let Some(max) = settings.max_connections {
        opt.max_connections(max);
    }
    if let Some(min) = settings.min_connections {
        opt.min_connections(min);
    }

    if let Some(timeout) = settings.connect_timeout {
        let timeout = Duration::from_secs(timeout);
        opt.connect_timeout(timeout);
        opt.acquire_timeout(timeout);
    }
    if let Some(idle) = settings.idle_timeout {
        opt.idle_timeout(Duration::from_secs(idle));
    }

    opt.max_lifetime(MAX_CONNECTION_LIFETIME)
        .sqlx_logging(settings.sqlx_logging);

    Database::connect(opt).await
}

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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、Redis、服务器、速率限制和工作器并发等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 速率限制配置
    pub rate_limiting: RateLimitingSettings,
    /// 工作器配置
    pub worker: WorkerSettings,
    /// 服务标识配置
    pub service: ServiceSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
    /// 是否输出SQL语句日志（爬取高峰期会非常吵，默认关闭）
    pub sqlx_logging: bool,
}

/// Redis配置设置
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 允许的CORS来源
    pub cors_origin: String,
}

/// 速率限制配置设置
#[derive(Debug, Deserialize)]
pub struct RateLimitingSettings {
    /// 是否启用速率限制
    pub enabled: bool,
    /// 默认每分钟请求数限制
    pub default_rpm: u32,
}

/// 工作器配置设置
#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    /// 并发工作器数量
    pub concurrency: usize,
}

/// 服务标识配置设置
#[derive(Debug, Deserialize)]
pub struct ServiceSettings {
    /// 服务名称（日志与指标标签）
    pub name: String,
    /// 运行环境（development/production）
    pub environment: String,
}

impl ServiceSettings {
    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 配置来源按优先级叠加：内置默认值 < 配置文件 < `SCANRS__`前缀环境变量
    /// < 文档化的顶级环境变量（DATABASE_URL、REDIS_URL、PORT、
    /// WORKER_CONCURRENCY、CORS_ORIGIN、SERVICE_NAME、APP_ENV）
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let mut builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.cors_origin", "http://localhost:5173")?
            // Default DB pool settings
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("database.sqlx_logging", false)?
            // Default Rate Limiting settings
            .set_default("rate_limiting.enabled", true)?
            .set_default("rate_limiting.default_rpm", 10)?
            // Default Worker settings
            .set_default("worker.concurrency", 2)?
            // Default Service settings
            .set_default("service.name", "privacy-analyzer")?
            .set_default("service.environment", "development")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SCANRS").separator("__"));

        // 顶级环境变量：部署约定的短名字覆盖前缀形式
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            builder = builder.set_override("redis.url", url)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(concurrency) = std::env::var("WORKER_CONCURRENCY") {
            builder = builder.set_override("worker.concurrency", concurrency)?;
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            builder = builder.set_override("server.cors_origin", origin)?;
        }
        if let Ok(name) = std::env::var("SERVICE_NAME") {
            builder = builder.set_override("service.name", name)?;
        }
        if let Ok(environment) = std::env::var("APP_ENV") {
            builder = builder.set_override("service.environment", environment)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_flag() {
        let service = ServiceSettings {
            name: "privacy-analyzer".to_string(),
            environment: "Production".to_string(),
        };
        assert!(service.is_production());

        let service = ServiceSettings {
            name: "privacy-analyzer".to_string(),
            environment: "development".to_string(),
        };
        assert!(!service.is_production());
    }
}

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

use crate::infrastructure::cache::redis_client::RedisClient;
use thiserror::Error;

/// 速率限制错误类型
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// 请求过多错误
    #[error("Too many requests")]
    TooManyRequests,

    /// 内部服务器错误
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// 速率限制器
///
/// 基于Redis INCR+EXPIRE的固定窗口限流，按客户端身份计数
pub struct RateLimiter {
    /// Redis客户端
    redis_client: RedisClient,

    /// 每分钟限制请求数
    limit_per_minute: u32,

    /// 是否启用
    enabled: bool,
}

impl RateLimiter {
    /// 创建新的速率限制器实例
    ///
    /// # 参数
    ///
    /// * `redis_client` - Redis客户端实例
    /// * `limit_per_minute` - 每分钟请求数限制
    /// * `enabled` - 是否启用限流
    ///
    /// # 返回值
    ///
    /// 返回新的速率限制器实例
    pub fn new(redis_client: RedisClient, limit_per_minute: u32, enabled: bool) -> Self {
        Self {
            redis_client,
            limit_per_minute,
            enabled,
        }
    }

    /// 检查客户端的请求速率是否超出限制
    ///
    /// # 参数
    ///
    /// * `client_id` - 客户端身份（通常是IP）
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 请求未超出限制
    /// * `Err(RateLimitError)` - 请求超出限制或发生错误
    pub async fn check(&self, client_id: &str) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }

        let key = format!("rate_limit:{}", client_id);
        let current_requests = self
            .redis_client
            .incr(&key)
            .await
            .map_err(|e| RateLimitError::InternalError(format!("Redis INCR failed: {}", e)))?;

        // 新窗口的首个请求设置一分钟过期
        if current_requests == 1 {
            self.redis_client.expire(&key, 60).await.map_err(|e| {
                RateLimitError::InternalError(format!("Redis EXPIRE failed: {}", e))
            })?;
        }

        if current_requests > self.limit_per_minute.into() {
            return Err(RateLimitError::TooManyRequests);
        }

        Ok(())
    }
}

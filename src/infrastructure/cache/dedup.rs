// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::infrastructure::cache::redis_client::RedisClient;

/// 去重窗口时长（10分钟）
pub const DEDUP_WINDOW_SECS: u64 = 600;

/// 在途锁特质
///
/// 抽象"原子不存在才设置+TTL"原语，便于替换底层存储。
/// 锁本身不跨慢速DB写持有状态：获取是一次原子操作，
/// 释放只发生在准入失败路径和任务终结路径。
#[async_trait]
pub trait InFlightLock: Send + Sync {
    /// 尝试获取键（不存在才成功）
    async fn try_acquire(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// 释放键
    async fn release(&self, key: &str) -> Result<()>;
}

/// 基于Redis的在途锁
#[derive(Clone)]
pub struct RedisInFlightLock {
    redis: RedisClient,
}

impl RedisInFlightLock {
    /// 创建新的Redis在途锁实例
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl InFlightLock for RedisInFlightLock {
    async fn try_acquire(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.redis.set_nx_ex(key, value, ttl.as_secs()).await
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.redis.del(key).await
    }
}

/// 进程内在途锁
///
/// 单进程部署和测试用；语义与Redis版一致（含TTL自然过期）
#[derive(Default)]
pub struct MemoryInFlightLock {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryInFlightLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InFlightLock for MemoryInFlightLock {
    async fn try_acquire(&self, key: &str, _value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().expect("in-flight lock poisoned");
        let now = Instant::now();

        // 清理已过期的键
        entries.retain(|_, expires_at| *expires_at > now);

        if entries.contains_key(key) {
            return Ok(false);
        }

        entries.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("in-flight lock poisoned");
        entries.remove(key);
        Ok(())
    }
}

/// 在途去重键的命名
pub fn inflight_key(canonical_url: &str) -> String {
    format!("inflight:{}", canonical_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_lock_is_exclusive() {
        let lock = MemoryInFlightLock::new();
        let key = inflight_key("https://example.com/");

        assert!(lock
            .try_acquire(&key, "job-1", Duration::from_secs(600))
            .await
            .unwrap());
        assert!(!lock
            .try_acquire(&key, "job-2", Duration::from_secs(600))
            .await
            .unwrap());

        lock.release(&key).await.unwrap();
        assert!(lock
            .try_acquire(&key, "job-3", Duration::from_secs(600))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn memory_lock_expires() {
        let lock = MemoryInFlightLock::new();
        let key = inflight_key("https://example.com/");

        assert!(lock
            .try_acquire(&key, "job-1", Duration::from_millis(10))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(lock
            .try_acquire(&key, "job-2", Duration::from_secs(600))
            .await
            .unwrap());
    }

    #[test]
    fn key_is_prefixed_with_namespace() {
        assert_eq!(
            inflight_key("https://example.com/"),
            "inflight:https://example.com/"
        );
    }
}

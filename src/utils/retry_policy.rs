// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 5s → 20s → 80s，封顶5分钟
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 4.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 计算第 `attempt` 次失败后的退避时间
    ///
    /// # 参数
    ///
    /// * `attempt` - 已失败的尝试次数（从1开始）
    ///
    /// # 返回值
    ///
    /// 返回下次重试前需要等待的时长
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_secs = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 计算下次重试时间
    pub fn next_retry_time(&self, attempt: u32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempt);
        base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64)
    }

    /// 是否还在尝试预算内
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_escalates_five_then_twenty_seconds() {
        let mut policy = RetryPolicy::default();
        policy.enable_jitter = false;

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(5));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(20));
        assert_eq!(policy.calculate_backoff(3), Duration::from_secs(80));
    }

    #[test]
    fn backoff_is_capped() {
        let mut policy = RetryPolicy::default();
        policy.enable_jitter = false;
        policy.max_backoff = Duration::from_secs(30);

        assert_eq!(policy.calculate_backoff(10), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_band() {
        let policy = RetryPolicy::default();

        let backoff = policy.calculate_backoff(1);
        assert!(backoff >= Duration::from_millis(4500));
        assert!(backoff <= Duration::from_millis(5500));
    }

    #[test]
    fn retry_budget_is_three_attempts() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn next_retry_time_advances_clock() {
        use chrono::TimeZone;

        let mut policy = RetryPolicy::default();
        policy.enable_jitter = false;

        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            policy.next_retry_time(1, base),
            base + chrono::Duration::seconds(5)
        );
        assert_eq!(
            policy.next_retry_time(2, base),
            base + chrono::Duration::seconds(20)
        );
    }
}

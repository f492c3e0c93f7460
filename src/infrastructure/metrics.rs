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

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

/// 初始化指标系统
///
/// 安装Prometheus记录器并注册应用指标
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        warn!("Failed to install Prometheus recorder: {}", e);
    }

    describe_counter!("scans_started_total", "Total number of scans started");
    describe_counter!("scans_succeeded_total", "Total number of scans succeeded");
    describe_counter!("scans_failed_total", "Total number of scans failed");
    describe_counter!(
        "scans_cached_total",
        "Total number of submissions served from the dedup window"
    );
    describe_counter!(
        "scans_ssrf_blocked_total",
        "Total number of submissions blocked by SSRF policy"
    );
    describe_counter!(
        "scans_validation_errors_total",
        "Total number of submissions rejected by URL validation"
    );
    describe_histogram!("scan_duration_seconds", "Duration of scans in seconds");
}

/// 耗时直方图桶边界（秒）
const DURATION_BUCKETS_SECS: [u64; 4] = [10, 30, 60, 90];

/// 进程内指标快照
///
/// 原子计数器支撑 `/metrics` JSON端点；每次记录同时写入
/// Prometheus记录器，两条通路共用同一份事件。
pub struct ProcessMetrics {
    started_at: Instant,
    scans_started: AtomicU64,
    scans_succeeded: AtomicU64,
    scans_failed: AtomicU64,
    scans_cached: AtomicU64,
    ssrf_blocked: AtomicU64,
    validation_errors: AtomicU64,
    // <10s, <30s, <60s, <90s, >=90s
    duration_buckets: [AtomicU64; 5],
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            scans_started: AtomicU64::new(0),
            scans_succeeded: AtomicU64::new(0),
            scans_failed: AtomicU64::new(0),
            scans_cached: AtomicU64::new(0),
            ssrf_blocked: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            duration_buckets: Default::default(),
        }
    }

    pub fn record_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
        counter!("scans_started_total").increment(1);
    }

    pub fn record_succeeded(&self) {
        self.scans_succeeded.fetch_add(1, Ordering::Relaxed);
        counter!("scans_succeeded_total").increment(1);
    }

    pub fn record_failed(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
        counter!("scans_failed_total").increment(1);
    }

    pub fn record_cached(&self) {
        self.scans_cached.fetch_add(1, Ordering::Relaxed);
        counter!("scans_cached_total").increment(1);
    }

    pub fn record_ssrf_blocked(&self) {
        self.ssrf_blocked.fetch_add(1, Ordering::Relaxed);
        counter!("scans_ssrf_blocked_total").increment(1);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
        counter!("scans_validation_errors_total").increment(1);
    }

    /// 记录一次扫描耗时
    pub fn record_duration(&self, duration: Duration) {
        histogram!("scan_duration_seconds").record(duration.as_secs_f64());

        let secs = duration.as_secs();
        let idx = DURATION_BUCKETS_SECS
            .iter()
            .position(|&bound| secs < bound)
            .unwrap_or(DURATION_BUCKETS_SECS.len());
        self.duration_buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// 输出JSON快照（计数器、直方图、运行时长、内存）
    pub fn snapshot(&self) -> serde_json::Value {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        json!({
            "counters": {
                "started": self.scans_started.load(Ordering::Relaxed),
                "succeeded": self.scans_succeeded.load(Ordering::Relaxed),
                "failed": self.scans_failed.load(Ordering::Relaxed),
                "cached": self.scans_cached.load(Ordering::Relaxed),
                "ssrfBlocked": self.ssrf_blocked.load(Ordering::Relaxed),
                "validationErrors": self.validation_errors.load(Ordering::Relaxed),
            },
            "durationHistogram": {
                "lt10s": self.duration_buckets[0].load(Ordering::Relaxed),
                "lt30s": self.duration_buckets[1].load(Ordering::Relaxed),
                "lt60s": self.duration_buckets[2].load(Ordering::Relaxed),
                "lt90s": self.duration_buckets[3].load(Ordering::Relaxed),
                "gte90s": self.duration_buckets[4].load(Ordering::Relaxed),
            },
            "uptimeSeconds": self.started_at.elapsed().as_secs(),
            "memory": {
                "usedBytes": sys.used_memory(),
                "totalBytes": sys.total_memory(),
            },
        })
    }
}

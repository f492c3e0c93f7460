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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 目标站点不可达（导航失败信号数 + 目标URL）
    #[error("UNREACHABLE:{signals}:{url}")]
    Unreachable { signals: usize, url: String },

    /// 浏览器驱动错误
    #[error("Browser error: {0}")]
    Browser(String),
}

/// 已知的跟踪型查询参数
pub const TRACKING_PARAMS: [&str; 12] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "dclid",
    "msclkid",
    "mc_eid",
    "igshid",
    "twclid",
];

/// 提取URL查询串中的跟踪参数
pub fn tracking_params_of(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };

    parsed
        .query_pairs()
        .filter_map(|(key, _)| {
            let key = key.to_ascii_lowercase();
            TRACKING_PARAMS.contains(&key.as_str()).then_some(key)
        })
        .collect()
}

/// 单个网络请求的捕获记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    /// 请求URL
    pub url: String,
    /// HTTP方法
    pub method: String,
    /// 资源类型（document/script/xhr/...）
    pub resource_type: String,
    /// 查询串中出现的跟踪参数
    pub tracking_params: Vec<String>,
    /// 是否携带POST数据
    pub has_post_data: bool,
}

/// 重定向链中的一跳
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectHop {
    pub from: String,
    pub to: String,
    pub status: i64,
}

/// 浏览器上下文中的Cookie记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// 过期时间（Unix秒）；会话Cookie为None
    pub expires: Option<f64>,
    pub secure: bool,
    pub http_only: bool,
    /// SameSite属性（strict/lax/none）；未设置为None
    pub same_site: Option<String>,
}

/// 内联脚本描述符
///
/// 原始脚本内容不持久化，只保留长度和跟踪签名标记
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineScript {
    pub length: u64,
    pub tracker_signature: bool,
}

/// 存储快照条目（值截断）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEntry {
    /// local 或 session
    pub scope: String,
    pub key: String,
    pub value: String,
}

/// sendBeacon调用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconCall {
    pub url: String,
    #[serde(rename = "hasData")]
    pub has_data: bool,
}

/// 预注入探针采集到的行为标志
///
/// 字段名与注入脚本维护的状态对象保持一致
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeFlags {
    #[serde(rename = "canvasFingerprint", default)]
    pub canvas_fingerprint: bool,
    #[serde(rename = "webglFingerprint", default)]
    pub webgl_fingerprint: bool,
    #[serde(rename = "fontFingerprint", default)]
    pub font_fingerprint: bool,
    #[serde(default)]
    pub keylogger: bool,
    #[serde(rename = "formSnooping", default)]
    pub form_snooping: bool,
    #[serde(default)]
    pub beacons: Vec<BeaconCall>,
    #[serde(rename = "serviceWorker", default)]
    pub service_worker: bool,
}

impl ProbeFlags {
    /// 合并另一页面的标志（任一页面命中即命中）
    pub fn merge(&mut self, other: &ProbeFlags) {
        self.canvas_fingerprint |= other.canvas_fingerprint;
        self.webgl_fingerprint |= other.webgl_fingerprint;
        self.font_fingerprint |= other.font_fingerprint;
        self.keylogger |= other.keylogger;
        self.form_snooping |= other.form_snooping;
        self.service_worker |= other.service_worker;
        self.beacons.extend(other.beacons.iter().cloned());
    }
}

/// 单个页面的捕获产物
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    /// 页面最终URL
    pub url: String,
    /// 主文档HTTP状态
    pub status: Option<i64>,
    /// 页面内发出的网络请求
    pub requests: Vec<NetworkRequest>,
    /// 主文档响应头
    pub response_headers: HashMap<String, String>,
    /// 重定向链
    pub redirects: Vec<RedirectHop>,
    /// 打开的WebSocket地址
    pub websocket_urls: Vec<String>,
    /// 外部脚本URL
    pub external_scripts: Vec<String>,
    /// 内联脚本描述符
    pub inline_scripts: Vec<InlineScript>,
    /// local/session存储快照
    pub storage: Vec<StorageEntry>,
    /// 同站内部链接
    pub internal_links: Vec<String>,
    /// 正文前5000字符
    pub body_text: String,
    /// 探针标志
    pub probe: ProbeFlags,
}

/// 一次完整爬取的聚合产物
///
/// 仅存在于一次任务执行内，分析管线消费后即丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// 规范化后的目标URL
    pub target_url: String,
    /// 首页最终URL
    pub final_url: String,
    /// 目标是否HTTPS
    pub is_https: bool,
    /// 各页面捕获（首页在前）
    pub pages: Vec<PageCapture>,
    /// 全上下文聚合Cookie（按名称+域名去重）
    pub cookies: Vec<CookieRecord>,
}

impl CrawlRecord {
    /// 实际爬取的页面数
    pub fn pages_crawled(&self) -> usize {
        self.pages.len()
    }

    /// 合并所有页面的探针标志
    pub fn merged_probe(&self) -> ProbeFlags {
        let mut merged = ProbeFlags::default();
        for page in &self.pages {
            merged.merge(&page.probe);
        }
        merged
    }

    /// 首页捕获
    pub fn homepage(&self) -> Option<&PageCapture> {
        self.pages.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_params_are_extracted_case_insensitively() {
        let params =
            tracking_params_of("https://t.example.com/p?UTM_Source=x&gclid=123&page=2");
        assert_eq!(params, vec!["utm_source", "gclid"]);
    }

    #[test]
    fn no_tracking_params_for_clean_url() {
        assert!(tracking_params_of("https://example.com/about?lang=en").is_empty());
    }

    #[test]
    fn probe_flags_merge_is_monotone() {
        let mut a = ProbeFlags {
            canvas_fingerprint: true,
            ..Default::default()
        };
        let b = ProbeFlags {
            keylogger: true,
            beacons: vec![BeaconCall {
                url: "/collect".to_string(),
                has_data: true,
            }],
            ..Default::default()
        };

        a.merge(&b);
        assert!(a.canvas_fingerprint);
        assert!(a.keylogger);
        assert_eq!(a.beacons.len(), 1);
    }

    #[test]
    fn unreachable_error_formats_with_signal_count() {
        let err = EngineError::Unreachable {
            signals: 3,
            url: "https://example.com/".to_string(),
        };
        assert_eq!(err.to_string(), "UNREACHABLE:3:https://example.com/");
    }
}

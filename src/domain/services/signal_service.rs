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

//! 安全信号
//!
//! 把爬取产物和各分析子结果折叠成一组面向用户的定性信号。

use serde::{Deserialize, Serialize};

use crate::domain::services::cookie_service::CookieAudit;
use crate::domain::services::tracker_service::{TrackerFinding, TrackerRisk};
use crate::engines::types::{CrawlRecord, ProbeFlags};

/// 信号档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Safe,
    Info,
    Warning,
    Danger,
}

/// 单条安全信号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySignal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub category: String,
    pub message: String,
}

fn signal(signal_type: SignalType, category: &str, message: String) -> SecuritySignal {
    SecuritySignal {
        signal_type,
        category: category.to_string(),
        message,
    }
}

/// 派生信号集合
///
/// # 参数
///
/// * `record` - 聚合爬取产物
/// * `probe` - 合并后的探针标志
/// * `trackers` - 追踪器识别结果
/// * `cookie_audit` - Cookie审计结果
/// * `inline_tracker_count` - 带追踪签名的内联脚本数
/// * `external_domain_count` - 非CDN外部域名数
pub fn derive_signals(
    record: &CrawlRecord,
    probe: &ProbeFlags,
    trackers: &[TrackerFinding],
    cookie_audit: &CookieAudit,
    inline_tracker_count: usize,
    external_domain_count: usize,
) -> Vec<SecuritySignal> {
    let mut signals = Vec::new();

    // HTTPS
    if record.is_https {
        signals.push(signal(
            SignalType::Safe,
            "transport",
            "Connection uses HTTPS".to_string(),
        ));
    } else {
        signals.push(signal(
            SignalType::Danger,
            "transport",
            "Site is served over unencrypted HTTP".to_string(),
        ));
    }

    // CSP
    let csp = record
        .homepage()
        .and_then(|page| page.response_headers.get("content-security-policy"));
    match csp {
        Some(policy) => {
            let mut qualifiers = Vec::new();
            if policy.contains("unsafe-inline") {
                qualifiers.push("allows unsafe-inline");
            }
            if policy.contains("unsafe-eval") {
                qualifiers.push("allows unsafe-eval");
            }

            if qualifiers.is_empty() {
                signals.push(signal(
                    SignalType::Safe,
                    "headers",
                    "Content-Security-Policy is set".to_string(),
                ));
            } else {
                signals.push(signal(
                    SignalType::Warning,
                    "headers",
                    format!("Content-Security-Policy is set but {}", qualifiers.join(" and ")),
                ));
            }
        }
        None => {
            signals.push(signal(
                SignalType::Warning,
                "headers",
                "No Content-Security-Policy header".to_string(),
            ));
        }
    }

    // 指纹采集
    if probe.canvas_fingerprint {
        signals.push(signal(
            SignalType::Warning,
            "fingerprinting",
            "Canvas fingerprinting detected".to_string(),
        ));
    }
    if probe.webgl_fingerprint {
        signals.push(signal(
            SignalType::Warning,
            "fingerprinting",
            "WebGL fingerprinting detected".to_string(),
        ));
    }
    if probe.font_fingerprint {
        signals.push(signal(
            SignalType::Warning,
            "fingerprinting",
            "Font enumeration detected".to_string(),
        ));
    }

    // 行为监控
    if probe.keylogger {
        signals.push(signal(
            SignalType::Danger,
            "behavior",
            "Global keystroke listeners registered".to_string(),
        ));
    }
    if probe.form_snooping {
        signals.push(signal(
            SignalType::Danger,
            "behavior",
            "Form input values are read by scripts".to_string(),
        ));
    }
    if !probe.beacons.is_empty() {
        signals.push(signal(
            SignalType::Warning,
            "behavior",
            format!("{} beacon call(s) observed", probe.beacons.len()),
        ));
    }

    // 通道
    let websocket_count: usize = record.pages.iter().map(|p| p.websocket_urls.len()).sum();
    if websocket_count > 0 {
        signals.push(signal(
            SignalType::Info,
            "network",
            format!("{} WebSocket connection(s) opened", websocket_count),
        ));
    }
    if probe.service_worker {
        signals.push(signal(
            SignalType::Info,
            "network",
            "Service worker registration attempted".to_string(),
        ));
    }

    // 重定向
    let redirect_count: usize = record.pages.iter().map(|p| p.redirects.len()).sum();
    if redirect_count > 3 {
        signals.push(signal(
            SignalType::Warning,
            "network",
            format!("Long redirect chain ({} hops)", redirect_count),
        ));
    }

    // 跟踪参数
    let tracking_param_requests: usize = record
        .pages
        .iter()
        .flat_map(|p| &p.requests)
        .filter(|r| !r.tracking_params.is_empty())
        .count();
    if tracking_param_requests > 0 {
        signals.push(signal(
            SignalType::Warning,
            "tracking",
            format!(
                "{} request(s) carry tracking parameters",
                tracking_param_requests
            ),
        ));
    }

    // Cookie规模
    let cookie_count = cookie_audit.summary.total;
    if cookie_count > 20 {
        signals.push(signal(
            SignalType::Warning,
            "cookies",
            format!("Heavy cookie usage ({} cookies)", cookie_count),
        ));
    } else if cookie_count > 0 {
        signals.push(signal(
            SignalType::Info,
            "cookies",
            format!("{} cookie(s) set", cookie_count),
        ));
    }

    // 内联追踪脚本
    if inline_tracker_count > 0 {
        signals.push(signal(
            SignalType::Warning,
            "tracking",
            format!("{} inline script(s) with tracker signatures", inline_tracker_count),
        ));
    }

    // 外部域名规模
    if external_domain_count > 10 {
        signals.push(signal(
            SignalType::Danger,
            "network",
            format!("Very high external domain count ({})", external_domain_count),
        ));
    } else if external_domain_count > 5 {
        signals.push(signal(
            SignalType::Warning,
            "network",
            format!("High external domain count ({})", external_domain_count),
        ));
    } else if external_domain_count > 0 {
        signals.push(signal(
            SignalType::Info,
            "network",
            format!("{} external domain(s) contacted", external_domain_count),
        ));
    }

    // 高风险追踪器汇总
    let high_risk_trackers = trackers
        .iter()
        .filter(|t| t.risk == TrackerRisk::High)
        .count();
    if high_risk_trackers > 0 {
        signals.push(signal(
            SignalType::Danger,
            "tracking",
            format!("{} high-risk tracker(s) present", high_risk_trackers),
        ));
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::cookie_service::audit_cookies;
    use crate::engines::types::{BeaconCall, PageCapture, ProbeFlags};
    use chrono::TimeZone;

    fn empty_record(is_https: bool) -> CrawlRecord {
        CrawlRecord {
            target_url: "https://example.com/".to_string(),
            final_url: "https://example.com/".to_string(),
            is_https,
            pages: vec![PageCapture {
                url: "https://example.com/".to_string(),
                status: Some(200),
                requests: vec![],
                response_headers: Default::default(),
                redirects: vec![],
                websocket_urls: vec![],
                external_scripts: vec![],
                inline_scripts: vec![],
                storage: vec![],
                internal_links: vec![],
                body_text: String::new(),
                probe: ProbeFlags::default(),
            }],
            cookies: vec![],
        }
    }

    fn empty_audit() -> CookieAudit {
        audit_cookies(
            &[],
            "example.com",
            chrono::Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    fn find<'a>(signals: &'a [SecuritySignal], category: &str) -> Vec<&'a SecuritySignal> {
        signals.iter().filter(|s| s.category == category).collect()
    }

    #[test]
    fn https_site_gets_safe_transport_signal() {
        let record = empty_record(true);
        let signals = derive_signals(
            &record,
            &ProbeFlags::default(),
            &[],
            &empty_audit(),
            0,
            0,
        );

        let transport = find(&signals, "transport");
        assert_eq!(transport.len(), 1);
        assert_eq!(transport[0].signal_type, SignalType::Safe);
    }

    #[test]
    fn http_site_gets_danger_transport_signal() {
        let record = empty_record(false);
        let signals = derive_signals(
            &record,
            &ProbeFlags::default(),
            &[],
            &empty_audit(),
            0,
            0,
        );

        assert_eq!(find(&signals, "transport")[0].signal_type, SignalType::Danger);
    }

    #[test]
    fn csp_with_unsafe_inline_is_a_warning() {
        let mut record = empty_record(true);
        record.pages[0].response_headers.insert(
            "content-security-policy".to_string(),
            "default-src 'self' 'unsafe-inline'".to_string(),
        );

        let signals = derive_signals(
            &record,
            &ProbeFlags::default(),
            &[],
            &empty_audit(),
            0,
            0,
        );

        let headers = find(&signals, "headers");
        assert_eq!(headers[0].signal_type, SignalType::Warning);
        assert!(headers[0].message.contains("unsafe-inline"));
    }

    #[test]
    fn keylogger_and_beacons_emit_behavior_signals() {
        let record = empty_record(true);
        let probe = ProbeFlags {
            keylogger: true,
            beacons: vec![BeaconCall {
                url: "/collect".to_string(),
                has_data: true,
            }],
            ..Default::default()
        };

        let signals = derive_signals(&record, &probe, &[], &empty_audit(), 0, 0);
        let behavior = find(&signals, "behavior");
        assert_eq!(behavior.len(), 2);
        assert!(behavior.iter().any(|s| s.signal_type == SignalType::Danger));
    }

    #[test]
    fn external_domain_bands() {
        let record = empty_record(true);
        let probe = ProbeFlags::default();

        for (count, expected) in [
            (0, None),
            (3, Some(SignalType::Info)),
            (7, Some(SignalType::Warning)),
            (15, Some(SignalType::Danger)),
        ] {
            let signals = derive_signals(&record, &probe, &[], &empty_audit(), 0, count);
            let network: Vec<_> = signals
                .iter()
                .filter(|s| s.category == "network" && s.message.contains("external domain"))
                .collect();

            match expected {
                None => assert!(network.is_empty()),
                Some(level) => assert_eq!(network[0].signal_type, level),
            }
        }
    }
}

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

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::domain::models::scan_report::{RiskLevel, ScanReport};
use crate::domain::services::cookie_service::{audit_cookies, CookieAudit};
use crate::domain::services::ownership_service::{
    build_ownership_graph, collect_external_domains, OwnershipGraph,
};
use crate::domain::services::scoring_service::{compute_score, ScoreInput};
use crate::domain::services::script_service::{
    analyze_external_scripts, EmptyKnownBadHashes, KnownBadHashes, ScriptIntel,
};
use crate::domain::services::signal_service::{derive_signals, SecuritySignal};
use crate::domain::services::tables::{host_of, is_cdn_hostname};
use crate::domain::services::tracker_service::{detect_trackers, TrackerFinding};
use crate::engines::types::CrawlRecord;

/// 分析产出
///
/// 映射到ScanReport的全部字段，raw_data保留完整的分析数据
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub score: i32,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub tracker_count: i32,
    pub cookie_count: i32,
    pub external_domain_count: i32,
    pub pages_crawled: i32,
    pub is_https: bool,
    pub has_csp: bool,
    pub canvas_fingerprint: bool,
    pub webgl_fingerprint: bool,
    pub font_fingerprint: bool,
    pub keylogger: bool,
    pub raw_data: serde_json::Value,
}

impl AnalysisOutcome {
    /// 由分析产出构造扫描报告
    pub fn into_report(self, scan_job_id: Uuid) -> ScanReport {
        ScanReport {
            id: Uuid::new_v4(),
            scan_job_id,
            score: self.score,
            risk_level: self.risk_level,
            summary: self.summary,
            tracker_count: self.tracker_count,
            cookie_count: self.cookie_count,
            external_domain_count: self.external_domain_count,
            pages_crawled: self.pages_crawled,
            is_https: self.is_https,
            has_csp: self.has_csp,
            canvas_fingerprint: self.canvas_fingerprint,
            webgl_fingerprint: self.webgl_fingerprint,
            font_fingerprint: self.font_fingerprint,
            keylogger: self.keylogger,
            raw_data: self.raw_data,
            created_at: Utc::now().into(),
        }
    }
}

/// 分析服务
///
/// 对一次爬取的聚合产物执行完整分析管线。除外部脚本抓取外，
/// 分析对捕获输入是纯函数：同一产物两次分析产出一致。
pub struct AnalysisService {
    known_bad: Arc<dyn KnownBadHashes>,
}

impl AnalysisService {
    /// 创建新的分析服务实例（空威胁清单）
    pub fn new() -> Self {
        Self {
            known_bad: Arc::new(EmptyKnownBadHashes),
        }
    }

    /// 创建带自定义威胁清单的分析服务实例
    pub fn with_known_bad(known_bad: Arc<dyn KnownBadHashes>) -> Self {
        Self { known_bad }
    }

    /// 执行完整分析
    ///
    /// # 参数
    ///
    /// * `record` - 聚合爬取产物
    ///
    /// # 返回值
    ///
    /// 返回可直接落库的分析产出
    pub async fn analyze(&self, record: &CrawlRecord) -> AnalysisOutcome {
        let script_urls: Vec<String> = record
            .pages
            .iter()
            .flat_map(|page| page.external_scripts.iter().cloned())
            .collect();

        let scripts = analyze_external_scripts(&script_urls, self.known_bad.as_ref()).await;

        analyze_captured(record, scripts, Utc::now())
    }
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

/// 对捕获输入的纯分析函数
///
/// # 参数
///
/// * `record` - 聚合爬取产物
/// * `scripts` - 已抓取的脚本情报
/// * `now` - 分析时刻（Cookie生命周期基准）
pub fn analyze_captured(
    record: &CrawlRecord,
    scripts: Vec<ScriptIntel>,
    now: DateTime<Utc>,
) -> AnalysisOutcome {
    let page_host = host_of(&record.final_url).unwrap_or_default();

    let trackers: Vec<TrackerFinding> = detect_trackers(record);
    let cookie_audit: CookieAudit = audit_cookies(&record.cookies, &page_host, now);
    let ownership: OwnershipGraph = build_ownership_graph(record);
    let probe = record.merged_probe();

    let inline_tracker_count = record
        .pages
        .iter()
        .flat_map(|page| &page.inline_scripts)
        .filter(|script| script.tracker_signature)
        .count();

    let tracking_param_requests = record
        .pages
        .iter()
        .flat_map(|page| &page.requests)
        .filter(|request| !request.tracking_params.is_empty())
        .count();

    let external_domains: HashSet<String> = collect_external_domains(record, &page_host)
        .into_iter()
        .filter(|host| !is_cdn_hostname(host))
        .collect();
    let external_domain_count = external_domains.len();

    let has_csp = record
        .homepage()
        .map(|page| page.response_headers.contains_key("content-security-policy"))
        .unwrap_or(false);

    let signals: Vec<SecuritySignal> = derive_signals(
        record,
        &probe,
        &trackers,
        &cookie_audit,
        inline_tracker_count,
        external_domain_count,
    );

    let score_input = ScoreInput {
        tracker_count: trackers.len(),
        cookie_count: cookie_audit.summary.total,
        is_https: record.is_https,
        has_csp,
        canvas_fingerprint: probe.canvas_fingerprint,
        webgl_fingerprint: probe.webgl_fingerprint,
        font_fingerprint: probe.font_fingerprint,
        keylogger: probe.keylogger,
        form_snooping: probe.form_snooping,
        beacon_count: probe.beacons.len(),
        service_worker: probe.service_worker,
        tracking_param_requests,
        inline_tracker_count,
    };

    let score = compute_score(&score_input);
    let risk_level = RiskLevel::from_score(score);

    let summary = build_summary(
        risk_level,
        trackers.len(),
        cookie_audit.summary.total,
        external_domain_count,
        record.pages_crawled(),
        &probe,
    );

    let raw_data = json!({
        "trackers": trackers,
        "cookies": cookie_audit,
        "scripts": scripts,
        "ownership": ownership,
        "signals": signals,
        "fingerprinting": {
            "canvas": probe.canvas_fingerprint,
            "webgl": probe.webgl_fingerprint,
            "font": probe.font_fingerprint,
        },
        "behavior": {
            "keylogger": probe.keylogger,
            "formSnooping": probe.form_snooping,
            "beacons": probe.beacons,
            "serviceWorker": probe.service_worker,
        },
        "pages": record.pages.iter().map(|p| &p.url).collect::<Vec<_>>(),
        "finalUrl": record.final_url,
    });

    AnalysisOutcome {
        score,
        risk_level,
        summary,
        tracker_count: trackers.len() as i32,
        cookie_count: cookie_audit.summary.total as i32,
        external_domain_count: external_domain_count as i32,
        pages_crawled: record.pages_crawled() as i32,
        is_https: record.is_https,
        has_csp,
        canvas_fingerprint: probe.canvas_fingerprint,
        webgl_fingerprint: probe.webgl_fingerprint,
        font_fingerprint: probe.font_fingerprint,
        keylogger: probe.keylogger,
        raw_data,
    }
}

/// 生成一句话摘要
fn build_summary(
    risk_level: RiskLevel,
    tracker_count: usize,
    cookie_count: usize,
    external_domain_count: usize,
    pages_crawled: usize,
    probe: &crate::engines::types::ProbeFlags,
) -> String {
    let mut summary = format!(
        "{} privacy risk: {} tracker(s), {} cookie(s), {} external domain(s) across {} page(s)",
        risk_level.to_string().to_uppercase(),
        tracker_count,
        cookie_count,
        external_domain_count,
        pages_crawled,
    );

    let mut extras = Vec::new();
    if probe.canvas_fingerprint || probe.webgl_fingerprint || probe.font_fingerprint {
        extras.push("fingerprinting detected");
    }
    if probe.keylogger {
        extras.push("keystroke monitoring detected");
    }
    if !extras.is_empty() {
        summary.push_str("; ");
        summary.push_str(&extras.join(", "));
    }
    summary.push('.');

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::types::{
        CookieRecord, NetworkRequest, PageCapture, ProbeFlags,
    };
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn sample_record() -> CrawlRecord {
        CrawlRecord {
            target_url: "https://example.com/".to_string(),
            final_url: "https://example.com/".to_string(),
            is_https: true,
            pages: vec![PageCapture {
                url: "https://example.com/".to_string(),
                status: Some(200),
                requests: vec![
                    NetworkRequest {
                        url: "https://www.google-analytics.com/collect?utm_source=x".to_string(),
                        method: "GET".to_string(),
                        resource_type: "xhr".to_string(),
                        tracking_params: vec!["utm_source".to_string()],
                        has_post_data: false,
                    },
                    NetworkRequest {
                        url: "https://example.com/api/items".to_string(),
                        method: "GET".to_string(),
                        resource_type: "xhr".to_string(),
                        tracking_params: vec![],
                        has_post_data: false,
                    },
                ],
                response_headers: [(
                    "content-security-policy".to_string(),
                    "default-src 'self'".to_string(),
                )]
                .into_iter()
                .collect(),
                redirects: vec![],
                websocket_urls: vec![],
                external_scripts: vec!["https://www.google-analytics.com/analytics.js".to_string()],
                inline_scripts: vec![],
                storage: vec![],
                internal_links: vec![],
                body_text: "welcome".to_string(),
                probe: ProbeFlags {
                    canvas_fingerprint: true,
                    ..Default::default()
                },
            }],
            cookies: vec![CookieRecord {
                name: "_ga".to_string(),
                value: "GA1.2.3".to_string(),
                domain: ".example.com".to_string(),
                path: "/".to_string(),
                expires: Some((fixed_now().timestamp() + 400 * 86_400) as f64),
                secure: true,
                http_only: false,
                same_site: Some("lax".to_string()),
            }],
        }
    }

    #[test]
    fn analysis_is_deterministic_for_same_input() {
        let record = sample_record();
        let first = analyze_captured(&record, vec![], fixed_now());
        let second = analyze_captured(&record, vec![], fixed_now());

        assert_eq!(first.score, second.score);
        assert_eq!(first.risk_level, second.risk_level);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.raw_data, second.raw_data);
    }

    #[test]
    fn outcome_fields_match_captured_evidence() {
        let record = sample_record();
        let outcome = analyze_captured(&record, vec![], fixed_now());

        assert_eq!(outcome.tracker_count, 1);
        assert_eq!(outcome.cookie_count, 1);
        assert_eq!(outcome.external_domain_count, 1);
        assert_eq!(outcome.pages_crawled, 1);
        assert!(outcome.is_https);
        assert!(outcome.has_csp);
        assert!(outcome.canvas_fingerprint);
        assert!(!outcome.keylogger);
    }

    #[test]
    fn score_reflects_deductions() {
        let record = sample_record();
        let outcome = analyze_captured(&record, vec![], fixed_now());

        // 1个追踪器(-8) + canvas(-15) + 跟踪参数(-10) = 67
        assert_eq!(outcome.score, 67);
        assert_eq!(outcome.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn raw_data_contains_every_section() {
        let record = sample_record();
        let outcome = analyze_captured(&record, vec![], fixed_now());

        for section in [
            "trackers",
            "cookies",
            "scripts",
            "ownership",
            "signals",
            "fingerprinting",
            "behavior",
            "pages",
        ] {
            assert!(
                outcome.raw_data.get(section).is_some(),
                "missing raw section {}",
                section
            );
        }
    }

    #[test]
    fn report_conversion_preserves_fields() {
        let record = sample_record();
        let outcome = analyze_captured(&record, vec![], fixed_now());
        let score = outcome.score;

        let job_id = Uuid::new_v4();
        let report = outcome.into_report(job_id);
        assert_eq!(report.scan_job_id, job_id);
        assert_eq!(report.score, score);
        assert_eq!(report.risk_level, RiskLevel::from_score(score));
    }
}

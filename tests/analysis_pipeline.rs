// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 分析管线集成测试
//!
//! 构造合成爬取产物走完整管线，验证评分边界、
//! 风险阈值和同输入同输出的确定性。

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

use scanrs::domain::models::scan_report::RiskLevel;
use scanrs::domain::services::analysis_service::analyze_captured;
use scanrs::engines::types::{
    BeaconCall, CookieRecord, CrawlRecord, InlineScript, NetworkRequest, PageCapture, ProbeFlags,
    RedirectHop,
};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn request(url: &str, tracking_params: Vec<&str>) -> NetworkRequest {
    NetworkRequest {
        url: url.to_string(),
        method: "GET".to_string(),
        resource_type: "script".to_string(),
        tracking_params: tracking_params.into_iter().map(String::from).collect(),
        has_post_data: false,
    }
}

fn cookie(name: &str, domain: &str, days: Option<i64>) -> CookieRecord {
    CookieRecord {
        name: name.to_string(),
        value: "v".to_string(),
        domain: domain.to_string(),
        path: "/".to_string(),
        expires: days.map(|d| (fixed_now().timestamp() + d * 86_400) as f64),
        secure: true,
        http_only: true,
        same_site: Some("lax".to_string()),
    }
}

fn clean_page(url: &str) -> PageCapture {
    PageCapture {
        url: url.to_string(),
        status: Some(200),
        requests: vec![request(&format!("{}api/data", url), vec![])],
        response_headers: HashMap::from([(
            "content-security-policy".to_string(),
            "default-src 'self'".to_string(),
        )]),
        redirects: vec![],
        websocket_urls: vec![],
        external_scripts: vec![],
        inline_scripts: vec![],
        storage: vec![],
        internal_links: vec![],
        body_text: "hello".to_string(),
        probe: ProbeFlags::default(),
    }
}

fn clean_record() -> CrawlRecord {
    CrawlRecord {
        target_url: "https://example.com/".to_string(),
        final_url: "https://example.com/".to_string(),
        is_https: true,
        pages: vec![clean_page("https://example.com/")],
        cookies: vec![],
    }
}

/// 重度追踪站点的合成产物
fn tracking_heavy_record() -> CrawlRecord {
    let mut page = clean_page("https://tracked.example.com/");
    page.requests = vec![
        request("https://www.google-analytics.com/collect", vec![]),
        request("https://connect.facebook.net/en_US/fbevents.js", vec![]),
        request("https://static.criteo.net/js/ld/ld.js", vec![]),
        request("https://static.hotjar.com/c.js", vec![]),
        request(
            "https://tracked.example.com/landing?utm_source=ad",
            vec!["utm_source"],
        ),
    ];
    page.external_scripts = vec![
        "https://www.google-analytics.com/analytics.js".to_string(),
        "https://connect.facebook.net/en_US/fbevents.js".to_string(),
    ];
    page.inline_scripts = vec![InlineScript {
        length: 420,
        tracker_signature: true,
    }];
    page.redirects = vec![
        RedirectHop {
            from: "http://tracked.example.com/".to_string(),
            to: "https://tracked.example.com/".to_string(),
            status: 301,
        };
        4
    ];
    page.websocket_urls = vec!["wss://live.tracked.example.com/feed".to_string()];
    page.response_headers.clear();
    page.probe = ProbeFlags {
        canvas_fingerprint: true,
        webgl_fingerprint: true,
        font_fingerprint: true,
        keylogger: true,
        form_snooping: true,
        beacons: vec![BeaconCall {
            url: "https://collect.tracked.example.com/b".to_string(),
            has_data: true,
        }],
        service_worker: true,
    };

    CrawlRecord {
        target_url: "https://tracked.example.com/".to_string(),
        final_url: "https://tracked.example.com/".to_string(),
        is_https: false,
        pages: vec![page],
        cookies: vec![
            cookie("_fbp", ".facebook.com", Some(800)),
            cookie("_ga", ".tracked.example.com", Some(400)),
        ],
    }
}

#[test]
fn clean_site_scores_high_with_low_risk() {
    let outcome = analyze_captured(&clean_record(), vec![], fixed_now());

    assert!(outcome.score >= 80, "clean site scored {}", outcome.score);
    assert_eq!(outcome.risk_level, RiskLevel::Low);
    assert_eq!(outcome.tracker_count, 0);
    assert!(outcome.has_csp);
    assert!(!outcome.canvas_fingerprint);
}

#[test]
fn tracking_heavy_site_bottoms_out_at_zero() {
    let outcome = analyze_captured(&tracking_heavy_record(), vec![], fixed_now());

    assert_eq!(outcome.score, 0);
    assert_eq!(outcome.risk_level, RiskLevel::High);
    assert!(outcome.tracker_count >= 4);
    assert!(outcome.canvas_fingerprint);
    assert!(outcome.keylogger);
    assert!(!outcome.is_https);
    assert!(!outcome.has_csp);
}

#[test]
fn score_is_always_in_bounds() {
    for record in [clean_record(), tracking_heavy_record()] {
        let outcome = analyze_captured(&record, vec![], fixed_now());
        assert!((0..=100).contains(&outcome.score));
        assert_eq!(outcome.risk_level, RiskLevel::from_score(outcome.score));
    }
}

#[test]
fn analysis_round_trip_is_identical() {
    let record = tracking_heavy_record();

    let first = analyze_captured(&record, vec![], fixed_now());
    let second = analyze_captured(&record, vec![], fixed_now());

    assert_eq!(first.score, second.score);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.tracker_count, second.tracker_count);
    assert_eq!(first.cookie_count, second.cookie_count);
    assert_eq!(first.external_domain_count, second.external_domain_count);
    assert_eq!(first.raw_data, second.raw_data);
}

#[test]
fn first_party_cookie_audit_scenario() {
    // 首页设置两个第一方Cookie：一个Secure+HttpOnly齐全，一个全缺
    let mut record = clean_record();
    record.cookies = vec![
        cookie("session_id", "example.com", None),
        CookieRecord {
            name: "prefs".to_string(),
            value: "dark".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        },
    ];

    let outcome = analyze_captured(&record, vec![], fixed_now());

    let summary = &outcome.raw_data["cookies"]["summary"];
    assert!(summary["security_issues"].as_u64().unwrap() >= 2);
    assert_eq!(summary["third_party_tracking"].as_u64().unwrap(), 0);
    assert_eq!(outcome.cookie_count, 2);
}

#[test]
fn raw_data_signals_cover_transport_and_tracking() {
    let outcome = analyze_captured(&tracking_heavy_record(), vec![], fixed_now());

    let signals = outcome.raw_data["signals"].as_array().unwrap().clone();
    let categories: Vec<&str> = signals
        .iter()
        .filter_map(|s| s["category"].as_str())
        .collect();

    assert!(categories.contains(&"transport"));
    assert!(categories.contains(&"fingerprinting"));
    assert!(categories.contains(&"behavior"));
    assert!(categories.contains(&"tracking"));

    // HTTP站点的transport信号必须是danger
    let transport = signals
        .iter()
        .find(|s| s["category"] == "transport")
        .unwrap();
    assert_eq!(transport["type"], "danger");
}

#[test]
fn ownership_graph_reflects_external_traffic() {
    let outcome = analyze_captured(&tracking_heavy_record(), vec![], fixed_now());

    let stats = &outcome.raw_data["ownership"]["stats"];
    assert!(stats["identified_domains"].as_u64().unwrap() >= 2);
    assert!(stats["total_companies"].as_u64().unwrap() >= 2);

    let concentration = stats["corporate_concentration"].as_u64().unwrap();
    assert!(concentration <= 100);
}

#[test]
fn external_domain_count_excludes_first_party() {
    let outcome = analyze_captured(&tracking_heavy_record(), vec![], fixed_now());

    // google-analytics, connect.facebook.net, static.criteo.net, static.hotjar.com
    assert_eq!(outcome.external_domain_count, 4);
}

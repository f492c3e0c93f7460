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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::services::tables::strip_www;
use crate::engines::types::CookieRecord;

/// 审计结果中保留的Cookie明细上限
const MAX_DETAILED_COOKIES: usize = 30;

/// Cookie用途分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookiePurpose {
    Session,
    Analytics,
    Tracking,
    Functional,
    Unknown,
}

/// Cookie风险档位（含生命周期档位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieRisk {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// 已知Cookie名称表：(名称或前缀, 公司, 用途, 风险)
///
/// 匹配规则：精确相等或前缀命中，按表序取首个。贪婪前缀策略
/// 是有意保留的：`mp_` 会吞掉所有 mp_ 开头的名称。
const KNOWN_COOKIES: [(&str, &str, CookiePurpose, CookieRisk); 22] = [
    ("_ga", "Google Analytics", CookiePurpose::Analytics, CookieRisk::Medium),
    ("_gid", "Google Analytics", CookiePurpose::Analytics, CookieRisk::Medium),
    ("_gat", "Google Analytics", CookiePurpose::Analytics, CookieRisk::Low),
    ("_gcl_", "Google Ads", CookiePurpose::Tracking, CookieRisk::High),
    ("IDE", "Google DoubleClick", CookiePurpose::Tracking, CookieRisk::High),
    ("NID", "Google", CookiePurpose::Tracking, CookieRisk::Medium),
    ("_fbp", "Meta", CookiePurpose::Tracking, CookieRisk::High),
    ("_fbc", "Meta", CookiePurpose::Tracking, CookieRisk::High),
    ("fr", "Meta", CookiePurpose::Tracking, CookieRisk::High),
    ("sb", "Meta", CookiePurpose::Tracking, CookieRisk::Medium),
    ("_hj", "Hotjar", CookiePurpose::Analytics, CookieRisk::Medium),
    ("mp_", "Mixpanel", CookiePurpose::Analytics, CookieRisk::Medium),
    ("ajs_", "Segment", CookiePurpose::Tracking, CookieRisk::Medium),
    ("amplitude_", "Amplitude", CookiePurpose::Analytics, CookieRisk::Medium),
    ("_pin_", "Pinterest", CookiePurpose::Tracking, CookieRisk::Medium),
    ("_ttp", "TikTok", CookiePurpose::Tracking, CookieRisk::High),
    ("li_", "LinkedIn", CookiePurpose::Tracking, CookieRisk::Medium),
    ("PHPSESSID", "", CookiePurpose::Session, CookieRisk::Safe),
    ("JSESSIONID", "", CookiePurpose::Session, CookieRisk::Safe),
    ("csrftoken", "", CookiePurpose::Functional, CookieRisk::Safe),
    ("__cf_bm", "Cloudflare", CookiePurpose::Functional, CookieRisk::Safe),
    ("cf_clearance", "Cloudflare", CookiePurpose::Functional, CookieRisk::Safe),
];

static SESSION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(sess|sid$|^sid|token)").expect("session regex"));
static TRACKING_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(track|pixel|visitor|uid$|^uid|campaign)").expect("tracking regex"));
static FUNCTIONAL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(consent|pref|lang|theme|settings)").expect("functional regex"));
static ANALYTICS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(stat|metric|analytic)").expect("analytics regex"));

/// 单个Cookie的分析明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieAnalysis {
    pub name: String,
    pub domain: String,
    /// 识别出的公司（未知为None）
    pub company: Option<String>,
    pub purpose: CookiePurpose,
    /// 最终风险（含提升规则）
    pub risk: CookieRisk,
    /// 生命周期天数；会话Cookie为None，已过期为负数
    pub lifetime_days: Option<i64>,
    /// 生命周期风险档位
    pub lifetime_risk: CookieRisk,
    /// 是否第三方
    pub third_party: bool,
    /// 属性审计问题
    pub issues: Vec<String>,
}

/// Cookie审计汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSummary {
    pub total: usize,
    pub third_party_tracking: usize,
    pub by_purpose: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<String, usize>,
    pub security_issues: usize,
    pub longest_lived_days: Option<i64>,
    pub longest_lived_name: Option<String>,
}

/// Cookie深度审计结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieAudit {
    /// 风险降序排列的明细（最多30条）
    pub cookies: Vec<CookieAnalysis>,
    pub summary: CookieSummary,
}

/// 对聚合Cookie做深度审计
///
/// # 参数
///
/// * `cookies` - 浏览器上下文聚合Cookie
/// * `page_host` - 页面主机名（第三方判定基准）
/// * `now` - 审计时刻（生命周期计算基准，外部传入保证可复现）
pub fn audit_cookies(
    cookies: &[CookieRecord],
    page_host: &str,
    now: DateTime<Utc>,
) -> CookieAudit {
    let mut analyses: Vec<CookieAnalysis> = cookies
        .iter()
        .map(|cookie| analyze_cookie(cookie, page_host, now))
        .collect();

    let total = analyses.len();
    let third_party_tracking = analyses
        .iter()
        .filter(|a| a.third_party && a.purpose == CookiePurpose::Tracking)
        .count();

    let mut by_purpose: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_risk: BTreeMap<String, usize> = BTreeMap::new();
    let mut security_issues = 0usize;
    let mut longest: Option<(&CookieAnalysis, i64)> = None;

    for analysis in &analyses {
        *by_purpose
            .entry(format!("{:?}", analysis.purpose).to_ascii_lowercase())
            .or_default() += 1;
        *by_risk
            .entry(format!("{:?}", analysis.risk).to_ascii_lowercase())
            .or_default() += 1;
        security_issues += analysis.issues.len();

        if let Some(days) = analysis.lifetime_days {
            if longest.map(|(_, best)| days > best).unwrap_or(true) {
                longest = Some((analysis, days));
            }
        }
    }

    let summary = CookieSummary {
        total,
        third_party_tracking,
        by_purpose,
        by_risk,
        security_issues,
        longest_lived_days: longest.map(|(_, days)| days),
        longest_lived_name: longest.map(|(a, _)| a.name.clone()),
    };

    // 风险高的排前面，同档稳定排序
    analyses.sort_by(|a, b| b.risk.cmp(&a.risk));
    analyses.truncate(MAX_DETAILED_COOKIES);

    CookieAudit {
        cookies: analyses,
        summary,
    }
}

fn analyze_cookie(cookie: &CookieRecord, page_host: &str, now: DateTime<Utc>) -> CookieAnalysis {
    let (company, purpose, base_risk) = classify_by_name(&cookie.name);

    let lifetime_days = lifetime_days(cookie, now);
    let lifetime_risk = lifetime_risk_bucket(lifetime_days);

    let third_party = is_third_party(&cookie.domain, page_host);
    let issues = audit_attributes(cookie);

    // 风险提升：长命追踪 或 第三方追踪
    let mut risk = base_risk;
    if purpose == CookiePurpose::Tracking
        && (lifetime_risk == CookieRisk::Critical || third_party)
    {
        risk = CookieRisk::High.max(risk);
    }

    CookieAnalysis {
        name: cookie.name.clone(),
        domain: cookie.domain.clone(),
        company,
        purpose,
        risk,
        lifetime_days,
        lifetime_risk,
        third_party,
        issues,
    }
}

/// 按名称分类：已知名称表（精确或前缀）优先，正则回退
fn classify_by_name(name: &str) -> (Option<String>, CookiePurpose, CookieRisk) {
    for (pattern, company, purpose, risk) in KNOWN_COOKIES {
        if name == pattern || name.starts_with(pattern) {
            let company = (!company.is_empty()).then(|| company.to_string());
            return (company, purpose, risk);
        }
    }

    if SESSION_NAME_RE.is_match(name) {
        return (None, CookiePurpose::Session, CookieRisk::Safe);
    }
    if TRACKING_NAME_RE.is_match(name) {
        return (None, CookiePurpose::Tracking, CookieRisk::Medium);
    }
    if ANALYTICS_NAME_RE.is_match(name) {
        return (None, CookiePurpose::Analytics, CookieRisk::Low);
    }
    if FUNCTIONAL_NAME_RE.is_match(name) {
        return (None, CookiePurpose::Functional, CookieRisk::Safe);
    }

    (None, CookiePurpose::Unknown, CookieRisk::Low)
}

/// 生命周期天数：会话Cookie为None，已过期为负数
fn lifetime_days(cookie: &CookieRecord, now: DateTime<Utc>) -> Option<i64> {
    cookie.expires.map(|expires| {
        let remaining_secs = expires - now.timestamp() as f64;
        (remaining_secs / 86_400.0).floor() as i64
    })
}

/// 生命周期风险分档
///
/// Session→safe，<30d→low，<365d→medium，<730d→high，≥730d→critical。
/// 档位对生命周期单调不减。
pub fn lifetime_risk_bucket(days: Option<i64>) -> CookieRisk {
    match days {
        None => CookieRisk::Safe,
        Some(days) if days < 30 => CookieRisk::Low,
        Some(days) if days < 365 => CookieRisk::Medium,
        Some(days) if days < 730 => CookieRisk::High,
        Some(_) => CookieRisk::Critical,
    }
}

/// 属性审计：Secure缺失、HttpOnly缺失、SameSite为None或未设置
fn audit_attributes(cookie: &CookieRecord) -> Vec<String> {
    let mut issues = Vec::new();

    if !cookie.secure {
        issues.push("missing Secure".to_string());
    }
    if !cookie.http_only {
        issues.push("missing HttpOnly".to_string());
    }
    match cookie.same_site.as_deref() {
        None => issues.push("SameSite not set".to_string()),
        Some("none") => issues.push("SameSite=None".to_string()),
        Some(_) => {}
    }

    issues
}

/// 第三方判定：域名与页面主机不匹配（`www.`剥除）
fn is_third_party(cookie_domain: &str, page_host: &str) -> bool {
    let domain = strip_www(cookie_domain.trim_start_matches('.'));
    let host = strip_www(page_host);

    host != domain && !host.ends_with(&format!(".{}", domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cookie(name: &str, domain: &str) -> CookieRecord {
        CookieRecord {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            expires: None,
            secure: true,
            http_only: true,
            same_site: Some("lax".to_string()),
        }
    }

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn with_lifetime_days(mut c: CookieRecord, days: i64) -> CookieRecord {
        c.expires = Some((base_now().timestamp() + days * 86_400) as f64);
        c
    }

    #[test]
    fn lifetime_buckets_are_monotone() {
        let buckets = [
            lifetime_risk_bucket(None),
            lifetime_risk_bucket(Some(-5)),
            lifetime_risk_bucket(Some(7)),
            lifetime_risk_bucket(Some(100)),
            lifetime_risk_bucket(Some(400)),
            lifetime_risk_bucket(Some(1000)),
        ];

        for pair in buckets.windows(2) {
            assert!(pair[0] <= pair[1], "bucket order violated: {:?}", buckets);
        }

        assert_eq!(lifetime_risk_bucket(None), CookieRisk::Safe);
        assert_eq!(lifetime_risk_bucket(Some(29)), CookieRisk::Low);
        assert_eq!(lifetime_risk_bucket(Some(30)), CookieRisk::Medium);
        assert_eq!(lifetime_risk_bucket(Some(364)), CookieRisk::Medium);
        assert_eq!(lifetime_risk_bucket(Some(365)), CookieRisk::High);
        assert_eq!(lifetime_risk_bucket(Some(729)), CookieRisk::High);
        assert_eq!(lifetime_risk_bucket(Some(730)), CookieRisk::Critical);
    }

    #[test]
    fn greedy_prefix_matches_mp_cookies() {
        let (company, purpose, _) = classify_by_name("mp_123abc_mixpanel");
        assert_eq!(company.as_deref(), Some("Mixpanel"));
        assert_eq!(purpose, CookiePurpose::Analytics);

        // 贪婪前缀策略：sb开头的名称都归Meta
        let (company, _, _) = classify_by_name("sbjs_first");
        assert_eq!(company.as_deref(), Some("Meta"));
    }

    #[test]
    fn attribute_audit_flags_missing_protections() {
        let mut c = cookie("plain", "example.com");
        c.secure = false;
        c.http_only = false;
        c.same_site = None;

        let issues = audit_attributes(&c);
        assert_eq!(issues.len(), 3);

        let mut c = cookie("partial", "example.com");
        c.same_site = Some("none".to_string());
        assert_eq!(audit_attributes(&c), vec!["SameSite=None"]);
    }

    #[test]
    fn third_party_detection_strips_www_and_dots() {
        assert!(!is_third_party(".example.com", "www.example.com"));
        assert!(!is_third_party("example.com", "example.com"));
        assert!(is_third_party(".doubleclick.net", "example.com"));
    }

    #[test]
    fn tracking_cookie_with_critical_lifetime_is_elevated() {
        let c = with_lifetime_days(cookie("_fbp", ".example.com"), 800);
        let analysis = analyze_cookie(&c, "example.com", base_now());
        assert_eq!(analysis.lifetime_risk, CookieRisk::Critical);
        assert!(analysis.risk >= CookieRisk::High);
    }

    #[test]
    fn third_party_tracking_cookie_is_elevated() {
        let c = cookie("sb", ".facebook.com");
        let analysis = analyze_cookie(&c, "example.com", base_now());
        assert!(analysis.third_party);
        assert_eq!(analysis.risk, CookieRisk::High);
    }

    #[test]
    fn first_party_security_scenario() {
        // 首页设置两个第一方Cookie：一个齐全、一个裸奔
        let good = cookie("session_id", "example.com");
        let mut bad = cookie("prefs", "example.com");
        bad.secure = false;
        bad.http_only = false;
        bad.same_site = None;

        let audit = audit_cookies(&[good, bad], "example.com", base_now());
        assert!(audit.summary.security_issues >= 2);
        assert_eq!(audit.summary.third_party_tracking, 0);
    }

    #[test]
    fn audit_sorts_high_risk_first_and_caps_detail() {
        let mut cookies = Vec::new();
        for i in 0..40 {
            cookies.push(cookie(&format!("harmless_{}", i), "example.com"));
        }
        cookies.push(cookie("_fbp", ".facebook.com"));

        let audit = audit_cookies(&cookies, "example.com", base_now());
        assert_eq!(audit.cookies.len(), 30);
        assert_eq!(audit.cookies[0].name, "_fbp");
        assert_eq!(audit.summary.total, 41);
    }

    #[test]
    fn longest_lived_cookie_is_reported() {
        let cookies = vec![
            with_lifetime_days(cookie("short", "example.com"), 10),
            with_lifetime_days(cookie("long", "example.com"), 500),
        ];

        let audit = audit_cookies(&cookies, "example.com", base_now());
        assert_eq!(audit.summary.longest_lived_days, Some(500));
        assert_eq!(audit.summary.longest_lived_name.as_deref(), Some("long"));
    }
}

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

use serde::{Deserialize, Serialize};

use crate::domain::services::tables::is_cdn_host;
use crate::engines::types::CrawlRecord;

/// 追踪器风险档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerRisk {
    Low,
    Medium,
    High,
}

/// 追踪器识别结果（每家公司一条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerFinding {
    /// 所属公司
    pub company: String,
    /// 命中的关键字
    pub pattern: String,
    /// 命中的URL样例
    pub matched_url: String,
    /// 风险档位
    pub risk: TrackerRisk,
}

/// 关键字 → (公司, 风险) 静态表
///
/// 按表序匹配，首个命中生效
pub const TRACKER_PATTERNS: [(&str, &str, TrackerRisk); 28] = [
    ("google-analytics.com", "Google Analytics", TrackerRisk::Medium),
    ("googletagmanager.com", "Google Tag Manager", TrackerRisk::Medium),
    ("doubleclick.net", "Google DoubleClick", TrackerRisk::High),
    ("googlesyndication", "Google AdSense", TrackerRisk::High),
    ("connect.facebook.net", "Meta Pixel", TrackerRisk::High),
    ("facebook.com/tr", "Meta Pixel", TrackerRisk::High),
    ("hotjar.com", "Hotjar", TrackerRisk::Medium),
    ("mixpanel.com", "Mixpanel", TrackerRisk::Medium),
    ("segment.com", "Segment", TrackerRisk::Medium),
    ("segment.io", "Segment", TrackerRisk::Medium),
    ("amplitude.com", "Amplitude", TrackerRisk::Medium),
    ("fullstory.com", "FullStory", TrackerRisk::High),
    ("mouseflow.com", "Mouseflow", TrackerRisk::High),
    ("clarity.ms", "Microsoft Clarity", TrackerRisk::Medium),
    ("mc.yandex.ru", "Yandex Metrica", TrackerRisk::Medium),
    ("criteo.com", "Criteo", TrackerRisk::High),
    ("criteo.net", "Criteo", TrackerRisk::High),
    ("taboola.com", "Taboola", TrackerRisk::High),
    ("outbrain.com", "Outbrain", TrackerRisk::Medium),
    ("adroll.com", "AdRoll", TrackerRisk::High),
    ("quantserve.com", "Quantcast", TrackerRisk::Medium),
    ("scorecardresearch.com", "Comscore", TrackerRisk::Medium),
    ("hs-analytics.net", "HubSpot", TrackerRisk::Medium),
    ("intercom.io", "Intercom", TrackerRisk::Low),
    ("matomo", "Matomo", TrackerRisk::Low),
    ("snap.licdn.com", "LinkedIn Insight", TrackerRisk::Medium),
    ("static.ads-twitter.com", "X Ads", TrackerRisk::Medium),
    ("analytics.tiktok.com", "TikTok Pixel", TrackerRisk::High),
];

/// 识别爬取产物中的第三方追踪器
///
/// 候选集合是所有外部脚本和网络请求URL的并集（去重、排除CDN白名单），
/// 每家公司最多产出一条结果。
///
/// # 参数
///
/// * `record` - 聚合爬取产物
///
/// # 返回值
///
/// 返回按公司去重的追踪器列表
pub fn detect_trackers(record: &CrawlRecord) -> Vec<TrackerFinding> {
    let mut candidates: Vec<String> = Vec::new();
    let mut seen_urls = HashSet::new();

    for page in &record.pages {
        for script_url in &page.external_scripts {
            if seen_urls.insert(script_url.clone()) {
                candidates.push(script_url.clone());
            }
        }
        for request in &page.requests {
            if seen_urls.insert(request.url.clone()) {
                candidates.push(request.url.clone());
            }
        }
    }

    let mut findings: Vec<TrackerFinding> = Vec::new();
    let mut seen_companies = HashSet::new();

    for url in candidates {
        if is_cdn_host(&url) {
            continue;
        }

        let lowered = url.to_ascii_lowercase();
        for (pattern, company, risk) in TRACKER_PATTERNS {
            if lowered.contains(pattern) {
                if seen_companies.insert(company) {
                    findings.push(TrackerFinding {
                        company: company.to_string(),
                        pattern: pattern.to_string(),
                        matched_url: url.clone(),
                        risk,
                    });
                }
                break;
            }
        }
    }

    findings
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 所有权图谱
//!
//! 把站点的外部域名流量映射到母公司，输出站点与公司的二部图
//! 以及集中度统计。

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::services::tables::{host_of, is_external_host, strip_www};
use crate::engines::types::CrawlRecord;

/// 域名 → (母公司, 品牌, 类别) 静态表
const DOMAIN_OWNERS: [(&str, &str, &str, &str); 30] = [
    ("google.com", "Alphabet", "Google", "advertising"),
    ("googleapis.com", "Alphabet", "Google APIs", "infrastructure"),
    ("gstatic.com", "Alphabet", "Google Static", "infrastructure"),
    ("google-analytics.com", "Alphabet", "Google Analytics", "analytics"),
    ("googletagmanager.com", "Alphabet", "Google Tag Manager", "analytics"),
    ("doubleclick.net", "Alphabet", "DoubleClick", "advertising"),
    ("googlesyndication.com", "Alphabet", "AdSense", "advertising"),
    ("youtube.com", "Alphabet", "YouTube", "social"),
    ("facebook.com", "Meta", "Facebook", "social"),
    ("facebook.net", "Meta", "Meta Pixel", "advertising"),
    ("fbcdn.net", "Meta", "Facebook CDN", "infrastructure"),
    ("instagram.com", "Meta", "Instagram", "social"),
    ("amazon-adsystem.com", "Amazon", "Amazon Ads", "advertising"),
    ("amazonaws.com", "Amazon", "AWS", "infrastructure"),
    ("cloudfront.net", "Amazon", "CloudFront", "infrastructure"),
    ("clarity.ms", "Microsoft", "Clarity", "analytics"),
    ("bing.com", "Microsoft", "Bing", "advertising"),
    ("linkedin.com", "Microsoft", "LinkedIn", "social"),
    ("licdn.com", "Microsoft", "LinkedIn CDN", "infrastructure"),
    ("twitter.com", "X Corp", "Twitter", "social"),
    ("ads-twitter.com", "X Corp", "X Ads", "advertising"),
    ("tiktok.com", "ByteDance", "TikTok", "social"),
    ("omtrdc.net", "Adobe", "Adobe Analytics", "analytics"),
    ("demdex.net", "Adobe", "Adobe Audience Manager", "advertising"),
    ("bluekai.com", "Oracle", "BlueKai", "advertising"),
    ("addthis.com", "Oracle", "AddThis", "advertising"),
    ("krxd.net", "Salesforce", "Krux", "advertising"),
    ("criteo.com", "Criteo", "Criteo", "advertising"),
    ("hotjar.com", "Hotjar", "Hotjar", "analytics"),
    ("cloudflare.com", "Cloudflare", "Cloudflare", "infrastructure"),
];

/// 图中的公司节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyNode {
    pub parent: String,
    /// 命中的品牌域名
    pub domains: Vec<String>,
    pub category: String,
}

/// 图谱统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipStats {
    pub total_companies: usize,
    pub identified_domains: usize,
    pub unknown_domains: usize,
    /// 前三大公司占外部域名的份额（百分比，四舍五入）
    pub corporate_concentration: u32,
    pub top_companies: Vec<String>,
    pub category_breakdown: BTreeMap<String, usize>,
}

/// 所有权图谱输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipGraph {
    /// 被分析的站点
    pub site: String,
    /// 公司节点（站点到每个节点各有一条边）
    pub nodes: Vec<CompanyNode>,
    /// 边：site → company
    pub edges: Vec<(String, String)>,
    pub stats: OwnershipStats,
}

/// 构建所有权图谱
pub fn build_ownership_graph(record: &CrawlRecord) -> OwnershipGraph {
    let site_host = host_of(&record.final_url).unwrap_or_default();
    let external_domains = collect_external_domains(record, &site_host);

    let mut by_parent: HashMap<String, CompanyNode> = HashMap::new();
    let mut parent_domain_counts: HashMap<String, usize> = HashMap::new();
    let mut identified = 0usize;

    for domain in &external_domains {
        match lookup_owner(domain) {
            Some((parent, brand, category)) => {
                identified += 1;
                *parent_domain_counts.entry(parent.to_string()).or_default() += 1;

                let node = by_parent
                    .entry(parent.to_string())
                    .or_insert_with(|| CompanyNode {
                        parent: parent.to_string(),
                        domains: Vec::new(),
                        category: category.to_string(),
                    });
                if !node.domains.contains(&brand.to_string()) {
                    node.domains.push(brand.to_string());
                }
            }
            None => {}
        }
    }

    let unknown = external_domains.len() - identified;

    // 前三大公司的域名份额
    let mut ranked: Vec<(String, usize)> = parent_domain_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let top3_share: usize = ranked.iter().take(3).map(|(_, count)| count).sum();
    let corporate_concentration = if external_domains.is_empty() {
        0
    } else {
        ((top3_share as f64 / external_domains.len() as f64) * 100.0).round() as u32
    };

    let top_companies: Vec<String> = ranked
        .iter()
        .take(3)
        .map(|(parent, _)| parent.clone())
        .collect();

    let mut category_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for node in by_parent.values() {
        *category_breakdown.entry(node.category.clone()).or_default() += 1;
    }

    let mut nodes: Vec<CompanyNode> = by_parent.into_values().collect();
    nodes.sort_by(|a, b| a.parent.cmp(&b.parent));

    let edges: Vec<(String, String)> = nodes
        .iter()
        .map(|node| (site_host.clone(), node.parent.clone()))
        .collect();

    let stats = OwnershipStats {
        total_companies: nodes.len(),
        identified_domains: identified,
        unknown_domains: unknown,
        corporate_concentration,
        top_companies,
        category_breakdown,
    };

    OwnershipGraph {
        site: site_host,
        nodes,
        edges,
        stats,
    }
}

/// 收集全部外部域名（去重）
pub fn collect_external_domains(record: &CrawlRecord, site_host: &str) -> Vec<String> {
    let mut domains = HashSet::new();

    for page in &record.pages {
        for request in &page.requests {
            if let Some(host) = host_of(&request.url) {
                if is_external_host(site_host, &host) {
                    domains.insert(host);
                }
            }
        }
        for script_url in &page.external_scripts {
            if let Some(host) = host_of(script_url) {
                if is_external_host(site_host, &host) {
                    domains.insert(host);
                }
            }
        }
    }

    let mut sorted: Vec<String> = domains.into_iter().collect();
    sorted.sort();
    sorted
}

/// 查找域名归属：精确匹配优先，失败后逐级剥离子域名
fn lookup_owner(host: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let normalized = strip_www(host);

    let mut candidate = normalized;
    loop {
        for (domain, parent, brand, category) in DOMAIN_OWNERS {
            if candidate == domain {
                return Some((parent, brand, category));
            }
        }

        match candidate.split_once('.') {
            Some((_, rest)) if rest.contains('.') => candidate = rest,
            _ => return None,
        }
    }
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 子页面选择
//!
//! 从站点地图URL和首页内链的并集中挑选最多3个同站页面。
//! 打分偏向"干净"的浅层路径：带查询串扣2分，每个路径段扣1分。

use std::collections::HashSet;

use url::Url;

/// 额外爬取的子页面上限
pub const MAX_SUBPAGES: usize = 3;

/// 静态资源扩展名，带这些后缀的路径不作为页面候选
const SKIP_EXTENSIONS: [&str; 14] = [
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".zip", ".gz",
    ".woff", ".woff2", ".ttf",
];

/// 从候选URL中选出得分最高的子页面
///
/// # 参数
///
/// * `homepage_url` - 首页的规范化URL（决定同站判定和排除自身）
/// * `candidates` - 站点地图URL与内链的并集
///
/// # 返回值
///
/// 返回按得分降序排列的最多 [`MAX_SUBPAGES`] 个URL
pub fn select_subpages(homepage_url: &str, candidates: &[String]) -> Vec<String> {
    let Ok(home) = Url::parse(homepage_url) else {
        return Vec::new();
    };
    let Some(host) = home.host_str() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut scored: Vec<(i32, String)> = candidates
        .iter()
        .filter_map(|raw| {
            let url = Url::parse(raw).ok()?;

            // 只保留同站页面
            if url.host_str() != Some(host) {
                return None;
            }

            // 排除首页自身
            if url.path() == home.path() && url.query() == home.query() {
                return None;
            }

            let path_lower = url.path().to_ascii_lowercase();
            if SKIP_EXTENSIONS.iter().any(|ext| path_lower.ends_with(ext)) {
                return None;
            }

            let normalized = url.to_string();
            if !seen.insert(normalized.clone()) {
                return None;
            }

            Some((page_score(&url), normalized))
        })
        .collect();

    // 得分降序，同分时按URL字典序保证确定性
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    scored
        .into_iter()
        .take(MAX_SUBPAGES)
        .map(|(_, url)| url)
        .collect()
}

/// 页面得分：−2（带查询串） − 非空路径段数
fn page_score(url: &Url) -> i32 {
    let query_penalty = if url.query().is_some() { -2 } else { 0 };

    let segment_count = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count() as i32)
        .unwrap_or(0);

    query_penalty - segment_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_shallow_clean_paths() {
        let candidates = vec![
            "https://example.com/a/b/c/deep".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/pricing".to_string(),
            "https://example.com/search?q=x".to_string(),
            "https://example.com/blog/post-1".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], "https://example.com/about");
        assert_eq!(selected[1], "https://example.com/pricing");
        assert_eq!(selected[2], "https://example.com/blog/post-1");
    }

    #[test]
    fn rejects_cross_host_urls() {
        let candidates = vec![
            "https://other.example.net/about".to_string(),
            "https://example.com/team".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected, vec!["https://example.com/team"]);
    }

    #[test]
    fn rejects_asset_paths() {
        let candidates = vec![
            "https://example.com/logo.png".to_string(),
            "https://example.com/app.js".to_string(),
            "https://example.com/site.css".to_string(),
            "https://example.com/archive.zip".to_string(),
            "https://example.com/font.woff2".to_string(),
            "https://example.com/contact".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected, vec!["https://example.com/contact"]);
    }

    #[test]
    fn excludes_the_homepage_itself() {
        let candidates = vec![
            "https://example.com/".to_string(),
            "https://example.com/about".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected, vec!["https://example.com/about"]);
    }

    #[test]
    fn query_string_costs_two_points() {
        let with_query = Url::parse("https://example.com/a?x=1").unwrap();
        let without = Url::parse("https://example.com/a").unwrap();
        assert_eq!(page_score(&with_query), -3);
        assert_eq!(page_score(&without), -1);
    }

    #[test]
    fn dedup_across_sitemap_and_links() {
        let candidates = vec![
            "https://example.com/about".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/faq".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn selection_is_deterministic_for_ties() {
        let candidates = vec![
            "https://example.com/zeta".to_string(),
            "https://example.com/alpha".to_string(),
        ];

        let selected = select_subpages("https://example.com/", &candidates);
        assert_eq!(selected[0], "https://example.com/alpha");
    }
}

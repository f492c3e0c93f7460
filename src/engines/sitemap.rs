// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

/// 站点地图抓取预算
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(5);

/// 站点地图返回的URL数量上限
const MAX_SITEMAP_URLS: usize = 200;

static LOC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("loc regex"));

/// 抓取目标站点的 `/sitemap.xml` 并提取 `<loc>` URL
///
/// 任何失败（超时、非2xx、无法解析）都静默降级为空列表，
/// 站点地图缺失不影响爬取主流程。
///
/// # 参数
///
/// * `homepage_url` - 首页的规范化URL
///
/// # 返回值
///
/// 返回提取到的URL列表（上限200条）
pub async fn fetch_sitemap_urls(homepage_url: &str) -> Vec<String> {
    let Ok(mut sitemap_url) = Url::parse(homepage_url) else {
        return Vec::new();
    };
    sitemap_url.set_path("/sitemap.xml");
    sitemap_url.set_query(None);
    sitemap_url.set_fragment(None);

    let client = match reqwest::Client::builder().timeout(SITEMAP_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            debug!("Failed to build sitemap client: {}", e);
            return Vec::new();
        }
    };

    let body = match client.get(sitemap_url.as_str()).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to read sitemap body: {}", e);
                return Vec::new();
            }
        },
        Ok(response) => {
            debug!("Sitemap fetch returned {}", response.status());
            return Vec::new();
        }
        Err(e) => {
            debug!("Sitemap fetch failed: {}", e);
            return Vec::new();
        }
    };

    extract_loc_urls(&body)
}

/// 从XML文本中提取 `<loc>` 元素内容
pub fn extract_loc_urls(xml: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .take(MAX_SITEMAP_URLS)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_loc_urls() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.com/</loc></url>
              <url><loc> https://example.com/about </loc></url>
              <url><loc>https://example.com/pricing</loc><priority>0.8</priority></url>
            </urlset>"#;

        let urls = extract_loc_urls(xml);
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/about",
                "https://example.com/pricing",
            ]
        );
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(extract_loc_urls("").is_empty());
        assert!(extract_loc_urls("<urlset></urlset>").is_empty());
    }

    #[test]
    fn sitemap_index_files_also_yield_locs() {
        let xml = r#"<sitemapindex>
              <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
            </sitemapindex>"#;

        assert_eq!(
            extract_loc_urls(xml),
            vec!["https://example.com/sitemap-posts.xml"]
        );
    }

    #[test]
    fn caps_the_number_of_urls() {
        let mut xml = String::from("<urlset>");
        for i in 0..500 {
            xml.push_str(&format!("<url><loc>https://example.com/p{}</loc></url>", i));
        }
        xml.push_str("</urlset>");

        assert_eq!(extract_loc_urls(&xml).len(), 200);
    }
}

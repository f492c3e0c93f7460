// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 分析管线共享的静态表

use url::Url;

/// CDN白名单主机
///
/// 这些主机承载公共库，不参与追踪器判定和脚本情报抓取
pub const CDN_ALLOWLIST: [&str; 10] = [
    "cdn.jsdelivr.net",
    "cdnjs.cloudflare.com",
    "unpkg.com",
    "ajax.googleapis.com",
    "fonts.googleapis.com",
    "fonts.gstatic.com",
    "code.jquery.com",
    "stackpath.bootstrapcdn.com",
    "maxcdn.bootstrapcdn.com",
    "use.fontawesome.com",
];

/// 判断URL的主机是否在CDN白名单内
pub fn is_cdn_host(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    is_cdn_hostname(host)
}

/// 判断主机名是否在CDN白名单内
pub fn is_cdn_hostname(host: &str) -> bool {
    CDN_ALLOWLIST
        .iter()
        .any(|cdn| host == *cdn || host.ends_with(&format!(".{}", cdn)))
}

/// 提取URL主机名（小写，保留子域名）
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// 去掉主机名前缀 `www.`
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// 判断候选主机对页面主机而言是否外部域名
pub fn is_external_host(page_host: &str, candidate_host: &str) -> bool {
    let page = strip_www(page_host);
    let candidate = strip_www(candidate_host);
    page != candidate && !candidate.ends_with(&format!(".{}", page))
}

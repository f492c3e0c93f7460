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

use std::net::Ipv4Addr;

use url::{Host, Url};

use crate::utils::errors::AdmissionError;

/// 校验并规范化用户提交的URL
///
/// 规则：
/// - 缺少协议时先补 `https://` 再解析
/// - 仅接受 http/https
/// - 主机名必须带点（拒绝无顶级域名的裸词）
/// - 拒绝IPv4/IPv6字面量（与SSRF检查无关，直接拒绝）
///
/// # 参数
///
/// * `raw` - 原始输入字符串
///
/// # 返回值
///
/// * `Ok(String)` - 规范化后的URL（小写主机名，省略默认端口）
/// * `Err(AdmissionError)` - 拒绝原因
pub fn validate_scan_url(raw: &str) -> Result<String, AdmissionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AdmissionError::UrlEmpty);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|_| AdmissionError::UrlMalformed)?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(AdmissionError::UrlInvalidProtocol),
    }

    let host = url.host().ok_or(AdmissionError::UrlInvalidHostname)?;

    let hostname = match host {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(_) | Host::Ipv6(_) => return Err(AdmissionError::UrlRawIp),
    };

    if hostname.is_empty() {
        return Err(AdmissionError::UrlInvalidHostname);
    }

    // url crate将不带括号的纯IPv4识别为Domain的情况不存在，
    // 但 "1.2.3.4." 这类带尾点的写法会作为域名漏过，这里补一道防线
    if hostname
        .trim_end_matches('.')
        .parse::<Ipv4Addr>()
        .is_ok()
    {
        return Err(AdmissionError::UrlRawIp);
    }

    if !hostname.contains('.') {
        return Err(AdmissionError::UrlNoTld);
    }

    Ok(url.to_string())
}

/// 提取规范化URL的主机名
pub fn hostname_of(canonical_url: &str) -> Option<String> {
    Url::parse(canonical_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

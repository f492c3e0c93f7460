// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 准入错误类型
///
/// 覆盖提交管线的全部拒绝原因：输入校验、DNS解析和SSRF策略。
/// 每个变体对应一个稳定的错误码，边界层将错误码映射为面向用户的提示。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// 请求缺少URL字段
    #[error("URL is required")]
    UrlMissing,

    /// URL为空字符串
    #[error("URL must not be empty")]
    UrlEmpty,

    /// URL无法解析
    #[error("URL could not be parsed")]
    UrlMalformed,

    /// 不支持的协议（仅允许 http/https）
    #[error("Only http and https URLs are supported")]
    UrlInvalidProtocol,

    /// 主机名缺失或非法
    #[error("URL hostname is invalid")]
    UrlInvalidHostname,

    /// 主机名没有顶级域名
    #[error("Hostname has no top-level domain")]
    UrlNoTld,

    /// 直接提交IP字面量
    #[error("Raw IP addresses are not supported")]
    UrlRawIp,

    /// DNS解析失败
    #[error("DNS resolution failed: {0}")]
    DnsFailed(String),

    /// DNS解析超时
    #[error("DNS resolution timed out")]
    DnsTimeout,

    /// 保留主机名被SSRF策略拒绝
    #[error("Hostname is blocked by policy")]
    SsrfBlockedHostname,

    /// 私有域名后缀被SSRF策略拒绝
    #[error("Hostname matches a private zone pattern")]
    SsrfBlockedPattern,

    /// 解析地址落入私有/保留网段
    #[error("Resolved address is private or reserved")]
    SsrfPrivateIp,
}

impl AdmissionError {
    /// 返回稳定的机器可读错误码
    pub fn code(&self) -> String {
        match self {
            AdmissionError::UrlMissing => "URL_MISSING".to_string(),
            AdmissionError::UrlEmpty => "URL_EMPTY".to_string(),
            AdmissionError::UrlMalformed => "URL_MALFORMED".to_string(),
            AdmissionError::UrlInvalidProtocol => "URL_INVALID_PROTOCOL".to_string(),
            AdmissionError::UrlInvalidHostname => "URL_INVALID_HOSTNAME".to_string(),
            AdmissionError::UrlNoTld => "URL_NO_TLD".to_string(),
            AdmissionError::UrlRawIp => "URL_RAW_IP".to_string(),
            AdmissionError::DnsFailed(kind) => format!("DNS_FAILED:{}", kind),
            AdmissionError::DnsTimeout => "DNS_TIMEOUT".to_string(),
            AdmissionError::SsrfBlockedHostname => "SSRF_BLOCKED_HOSTNAME".to_string(),
            AdmissionError::SsrfBlockedPattern => "SSRF_BLOCKED_PATTERN".to_string(),
            AdmissionError::SsrfPrivateIp => "SSRF_PRIVATE_IP".to_string(),
        }
    }

    /// 返回面向客户端的提示文案
    ///
    /// 内部细节（解析器错误、网段信息）不会出现在返回值里
    pub fn client_message(&self) -> &'static str {
        match self {
            AdmissionError::UrlMissing | AdmissionError::UrlEmpty => {
                "Please provide a URL to analyze."
            }
            AdmissionError::UrlNoTld => {
                "That doesn't look like a real domain. Please enter a full website address."
            }
            AdmissionError::UrlMalformed
            | AdmissionError::UrlInvalidProtocol
            | AdmissionError::UrlInvalidHostname => {
                "The URL appears to be malformed. Please check it and try again."
            }
            AdmissionError::UrlRawIp => {
                "Scanning IP addresses directly is not supported. Please use a domain name."
            }
            AdmissionError::DnsFailed(_) | AdmissionError::DnsTimeout => {
                "We couldn't resolve that domain. Please check the address and try again."
            }
            AdmissionError::SsrfBlockedHostname
            | AdmissionError::SsrfBlockedPattern
            | AdmissionError::SsrfPrivateIp => {
                "Scanning private or internal network addresses is not permitted."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AdmissionError::UrlNoTld.code(), "URL_NO_TLD");
        assert_eq!(AdmissionError::SsrfPrivateIp.code(), "SSRF_PRIVATE_IP");
        assert_eq!(
            AdmissionError::DnsFailed("NXDOMAIN".to_string()).code(),
            "DNS_FAILED:NXDOMAIN"
        );
    }

    #[test]
    fn client_messages_do_not_leak_internals() {
        let err = AdmissionError::DnsFailed("connection reset by peer".to_string());
        assert!(!err.client_message().contains("connection reset"));

        assert!(AdmissionError::UrlNoTld
            .client_message()
            .contains("doesn't look like a real domain"));
        assert!(AdmissionError::SsrfPrivateIp
            .client_message()
            .contains("not permitted"));
    }
}

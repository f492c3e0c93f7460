// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;

use crate::utils::errors::AdmissionError;

/// DNS解析超时
const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// 保留主机名字面量，命中即拒绝
const BLOCKED_HOSTNAMES: [&str; 4] = [
    "localhost",
    "0.0.0.0",
    "metadata.google.internal",
    "169.254.169.254",
];

/// 私有域名后缀，命中即拒绝
const BLOCKED_SUFFIXES: [&str; 5] = [".local", ".internal", ".corp", ".lan", ".intranet"];

/// 解析主机名为一个IP地址
///
/// 在5秒期限内完成解析；多个地址时取解析器返回顺序的第一个。
/// 解析必须先于任何任务/队列资源的分配。
///
/// # 参数
///
/// * `hostname` - 待解析的主机名
///
/// # 返回值
///
/// * `Ok(IpAddr)` - 解析出的地址
/// * `Err(AdmissionError)` - 超时或解析失败
pub async fn resolve_host(hostname: &str) -> Result<IpAddr, AdmissionError> {
    // lookup_host 需要 host:port 形式，端口仅用于凑格式
    let query = format!("{}:443", hostname);

    let resolved = tokio::time::timeout(DNS_TIMEOUT, lookup_host(query))
        .await
        .map_err(|_| AdmissionError::DnsTimeout)?;

    match resolved {
        Ok(mut addrs) => addrs
            .next()
            .map(|sa| sa.ip())
            .ok_or_else(|| AdmissionError::DnsFailed("NO_ADDRESS".to_string())),
        Err(e) => {
            let kind = match e.kind() {
                std::io::ErrorKind::NotFound => "NOT_FOUND",
                std::io::ErrorKind::TimedOut => "TIMED_OUT",
                _ => "LOOKUP_ERROR",
            };
            Err(AdmissionError::DnsFailed(kind.to_string()))
        }
    }
}

/// 主机名解析特质
///
/// 准入管线通过该接口解析，便于在测试里替换系统解析器
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// 解析主机名为一个地址
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, AdmissionError>;
}

/// 系统解析器（tokio lookup_host + 5秒期限）
#[derive(Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, AdmissionError> {
        resolve_host(hostname).await
    }
}

/// SSRF防护检查
///
/// 主机名检查（保留字面量、私有后缀）和地址检查（私有/保留网段）
/// 全部针对**解析后的地址**执行，通过操作顺序抵御DNS重绑定。
///
/// # 参数
///
/// * `hostname` - 原始主机名（小写）
/// * `addr` - 已解析出的地址
///
/// # 返回值
///
/// * `Ok(())` - 检查通过
/// * `Err(AdmissionError)` - 被策略拒绝
pub fn check_ssrf(hostname: &str, addr: IpAddr) -> Result<(), AdmissionError> {
    let host = hostname.to_ascii_lowercase();

    if BLOCKED_HOSTNAMES.contains(&host.as_str()) {
        return Err(AdmissionError::SsrfBlockedHostname);
    }

    if BLOCKED_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return Err(AdmissionError::SsrfBlockedPattern);
    }

    if is_private_or_reserved(addr) {
        return Err(AdmissionError::SsrfPrivateIp);
    }

    Ok(())
}

/// 判断地址是否落入私有或保留网段
fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            // 127.0.0.0/8 (Loopback)
            if ipv4.is_loopback() {
                return true;
            }
            // 10.0.0.0/8
            if octets[0] == 10 {
                return true;
            }
            // 192.168.0.0/16
            if octets[0] == 192 && octets[1] == 168 {
                return true;
            }
            // 172.16.0.0/12
            if octets[0] == 172 && (16..=31).contains(&octets[1]) {
                return true;
            }
            // 169.254.0.0/16 (Link-local)
            if ipv4.is_link_local() {
                return true;
            }
            // 100.64.0.0/10 (CGNAT)
            if octets[0] == 100 && (64..=127).contains(&octets[1]) {
                return true;
            }
            // 0.0.0.0/8
            if octets[0] == 0 {
                return true;
            }
            false
        }
        IpAddr::V6(ipv6) => {
            // ::1 (Loopback)
            if ipv6.is_loopback() {
                return true;
            }
            // fc00::/7 (Unique Local)
            if (ipv6.segments()[0] & 0xfe00) == 0xfc00 {
                return true;
            }
            // fe80::/10 (Link-local)
            if (ipv6.segments()[0] & 0xffc0) == 0xfe80 {
                return true;
            }
            // IPv4映射地址按映射目标判定
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(mapped));
            }
            false
        }
    }
}

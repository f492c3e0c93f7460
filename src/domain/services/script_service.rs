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

//! 外部脚本情报
//!
//! 抓取非CDN外部脚本做启发式风险评估：哈希对照、香农熵、
//! 混淆签名和数据外送模式计数、混淆评分。不做强恶意判定。

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::services::tables::is_cdn_host;

/// 单任务内分析的外部脚本上限
const MAX_SCRIPTS: usize = 8;

/// 脚本抓取超时
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// 参与文本分析的字节上限（100KB）
const ANALYSIS_CAP: usize = 100 * 1024;

/// 已知恶意哈希判定
///
/// 默认实现是空集合；威胁情报源接入时替换本实现即可
pub trait KnownBadHashes: Send + Sync {
    fn contains(&self, sha256_hex: &str) -> bool;
}

/// 空威胁清单
#[derive(Default)]
pub struct EmptyKnownBadHashes;

impl KnownBadHashes for EmptyKnownBadHashes {
    fn contains(&self, _sha256_hex: &str) -> bool {
        false
    }
}

/// 固定哈希集合（测试与静态清单用）
pub struct StaticKnownBadHashes(pub HashSet<String>);

impl KnownBadHashes for StaticKnownBadHashes {
    fn contains(&self, sha256_hex: &str) -> bool {
        self.0.contains(sha256_hex)
    }
}

/// 签名严重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// 混淆签名集合：(名称, 正则, 严重度)
static OBFUSCATION_SIGNATURES: Lazy<Vec<(&'static str, Regex, Severity)>> = Lazy::new(|| {
    vec![
        ("eval", Regex::new(r"\beval\s*\(").unwrap(), Severity::High),
        (
            "new-function",
            Regex::new(r"new\s+Function\s*\(").unwrap(),
            Severity::High,
        ),
        (
            "hex-escape",
            Regex::new(r"\\x[0-9a-fA-F]{2}").unwrap(),
            Severity::Medium,
        ),
        (
            "unicode-escape",
            Regex::new(r"\\u[0-9a-fA-F]{4}").unwrap(),
            Severity::Medium,
        ),
        ("atob", Regex::new(r"\batob\s*\(").unwrap(), Severity::Medium),
        (
            "from-char-code",
            Regex::new(r"String\.fromCharCode").unwrap(),
            Severity::High,
        ),
        (
            "bracket-call",
            Regex::new(r#"window\s*\[\s*["']"#).unwrap(),
            Severity::Medium,
        ),
        (
            "settimeout-string",
            Regex::new(r#"setTimeout\s*\(\s*["']"#).unwrap(),
            Severity::Medium,
        ),
        (
            "obfuscated-property",
            Regex::new(r#"(?:document|window)\s*\[\s*["'][^"']+["']\s*\+"#).unwrap(),
            Severity::Medium,
        ),
    ]
});

/// 数据外送模式集合：(名称, 正则)
static EXFILTRATION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("cookie-read", Regex::new(r"document\.cookie").unwrap()),
        (
            "storage-access",
            Regex::new(r"(?:localStorage|sessionStorage)\s*[.\[]").unwrap(),
        ),
        ("navigator-probe", Regex::new(r"navigator\.\w+").unwrap()),
        ("screen-probe", Regex::new(r"screen\.\w+").unwrap()),
        (
            "network-send",
            Regex::new(r"\bfetch\s*\(|XMLHttpRequest").unwrap(),
        ),
        ("beacon", Regex::new(r"sendBeacon").unwrap()),
        ("websocket", Regex::new(r"new\s+WebSocket").unwrap()),
        ("geolocation", Regex::new(r"geolocation").unwrap()),
        ("battery", Regex::new(r"getBattery").unwrap()),
        (
            "layout-probe",
            Regex::new(r"getBoundingClientRect|offsetWidth|offsetHeight").unwrap(),
        ),
    ]
});

static LONG_STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'][^"'\n]{150,}["']"#).expect("long string regex"));
static SHORT_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:var|let|const)\s+[a-zA-Z_$]{1,2}\b").expect("short var regex"));

/// 脚本风险档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptRisk {
    Low,
    Medium,
    High,
}

/// 单个脚本的情报结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptIntel {
    pub url: String,
    /// 完整脚本体的SHA-256（抓取失败为None）
    pub sha256: Option<String>,
    /// 命中已知恶意哈希清单
    pub known_bad: bool,
    /// 采样文本的香农熵
    pub entropy: f64,
    /// 混淆评分 [0,100]
    pub obfuscation_score: u32,
    /// 混淆签名命中：名称 → 次数
    pub signature_hits: HashMap<String, usize>,
    /// 外送模式命中：名称 → 次数
    pub exfiltration_hits: HashMap<String, usize>,
    pub risk: ScriptRisk,
    /// 抓取失败原因（仅失败时）
    pub fetch_error: Option<String>,
}

/// 抓取并分析非CDN外部脚本（最多8个）
///
/// # 参数
///
/// * `script_urls` - 候选外部脚本URL
/// * `known_bad` - 已知恶意哈希判定
///
/// # 返回值
///
/// 返回风险降序排列的脚本情报
pub async fn analyze_external_scripts(
    script_urls: &[String],
    known_bad: &dyn KnownBadHashes,
) -> Vec<ScriptIntel> {
    let mut seen = HashSet::new();
    let targets: Vec<&String> = script_urls
        .iter()
        .filter(|url| !is_cdn_host(url) && seen.insert(url.as_str()))
        .take(MAX_SCRIPTS)
        .collect();

    let client = match reqwest::Client::builder().timeout(FETCH_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            debug!("Failed to build script client: {}", e);
            return Vec::new();
        }
    };

    let mut results = Vec::new();
    for url in targets {
        let intel = match fetch_script(&client, url).await {
            Ok(body) => analyze_script_body(url, &body, known_bad),
            Err(error) => ScriptIntel {
                url: url.clone(),
                sha256: None,
                known_bad: false,
                entropy: 0.0,
                obfuscation_score: 0,
                signature_hits: HashMap::new(),
                exfiltration_hits: HashMap::new(),
                risk: ScriptRisk::Low,
                fetch_error: Some(error),
            },
        };
        results.push(intel);
    }

    results.sort_by(|a, b| b.risk.cmp(&a.risk));
    results
}

async fn fetch_script(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("fetch failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| format!("body read failed: {}", e))?;

    Ok(body.to_vec())
}

/// 分析脚本体（抓取之外的纯函数，同输入同输出）
pub fn analyze_script_body(url: &str, body: &[u8], known_bad: &dyn KnownBadHashes) -> ScriptIntel {
    // 哈希对完整体计算，文本分析按上限采样
    let sha256_hex = format!("{:x}", Sha256::digest(body));
    let is_known_bad = known_bad.contains(&sha256_hex);

    let sample_len = body.len().min(ANALYSIS_CAP);
    let text = String::from_utf8_lossy(&body[..sample_len]);

    let entropy = shannon_entropy(&text);

    let mut signature_hits = HashMap::new();
    let mut high_severity = 0usize;
    let mut total_signatures = 0usize;
    for (name, regex, severity) in OBFUSCATION_SIGNATURES.iter() {
        let count = regex.find_iter(&text).count();
        if count > 0 {
            signature_hits.insert(name.to_string(), count);
            total_signatures += count;
            if *severity == Severity::High {
                high_severity += count;
            }
        }
    }

    let mut exfiltration_hits = HashMap::new();
    for (name, regex) in EXFILTRATION_PATTERNS.iter() {
        let count = regex.find_iter(&text).count();
        if count > 0 {
            exfiltration_hits.insert(name.to_string(), count);
        }
    }

    let obfuscation_score = obfuscation_score(&text, entropy);

    let risk = if is_known_bad || obfuscation_score >= 60 || high_severity >= 2 {
        ScriptRisk::High
    } else if obfuscation_score >= 30 || high_severity >= 1 || total_signatures >= 3 {
        ScriptRisk::Medium
    } else {
        ScriptRisk::Low
    };

    ScriptIntel {
        url: url.to_string(),
        sha256: Some(sha256_hex),
        known_bad: is_known_bad,
        entropy,
        obfuscation_score,
        signature_hits,
        exfiltration_hits,
        risk,
        fetch_error: None,
    }
}

/// 香农熵（按字节频率，单位bit）
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    let bytes = text.as_bytes();
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// 混淆评分
///
/// 熵分档 +40/+20/+10（>5.5/>4.8/>4.2）；
/// 长字符串分档 +30/+15（>5/>2个）；
/// 非字母数字占比 +20/+10（>0.35/>0.25）；
/// 短变量声明 +10（>50个）。裁剪到[0,100]。
pub fn obfuscation_score(text: &str, entropy: f64) -> u32 {
    let mut score = 0i32;

    if entropy > 5.5 {
        score += 40;
    } else if entropy > 4.8 {
        score += 20;
    } else if entropy > 4.2 {
        score += 10;
    }

    let long_strings = LONG_STRING_RE.find_iter(text).count();
    if long_strings > 5 {
        score += 30;
    } else if long_strings > 2 {
        score += 15;
    }

    let non_alpha_ratio = non_alphanumeric_ratio(text);
    if non_alpha_ratio > 0.35 {
        score += 20;
    } else if non_alpha_ratio > 0.25 {
        score += 10;
    }

    if SHORT_VAR_RE.find_iter(text).count() > 50 {
        score += 10;
    }

    score.clamp(0, 100) as u32
}

/// 非字母数字、非空白字符的占比
fn non_alphanumeric_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let total = text.chars().count() as f64;
    let non_alpha = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count() as f64;

    non_alpha / total
}

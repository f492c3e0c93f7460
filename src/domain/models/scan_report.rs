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

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 扫描报告实体
///
/// 与一个SUCCESS扫描任务一一对应的评分结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// 报告唯一标识符
    pub id: Uuid,
    /// 关联的扫描任务ID
    pub scan_job_id: Uuid,
    /// 隐私评分 [0,100]
    pub score: i32,
    /// 风险等级
    pub risk_level: RiskLevel,
    /// 人类可读的摘要
    pub summary: String,
    /// 追踪器数量
    pub tracker_count: i32,
    /// Cookie数量
    pub cookie_count: i32,
    /// 外部域名数量
    pub external_domain_count: i32,
    /// 实际爬取的页面数
    pub pages_crawled: i32,
    /// 站点是否HTTPS
    pub is_https: bool,
    /// 是否设置了CSP
    pub has_csp: bool,
    /// 检测到Canvas指纹采集
    pub canvas_fingerprint: bool,
    /// 检测到WebGL指纹采集
    pub webgl_fingerprint: bool,
    /// 检测到字体指纹采集
    pub font_fingerprint: bool,
    /// 检测到键盘监听
    pub keylogger: bool,
    /// 完整分析数据
    pub raw_data: serde_json::Value,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

/// 风险等级枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskLevel {
    /// 由隐私评分确定性地推导风险等级
    ///
    /// 阈值：≥80 LOW，≥60 MODERATE，≥40 ELEVATED，其余 HIGH
    pub fn from_score(score: i32) -> Self {
        if score >= 80 {
            RiskLevel::Low
        } else if score >= 60 {
            RiskLevel::Moderate
        } else if score >= 40 {
            RiskLevel::Elevated
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::Elevated => write!(f, "elevated"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "moderate" => Ok(RiskLevel::Moderate),
            "elevated" => Ok(RiskLevel::Elevated),
            "high" => Ok(RiskLevel::High),
            _ => Err(()),
        }
    }
}

impl ScanReport {
    /// 由分析产出构造新报告
    #[allow(clippy::too_many_arguments)]
    pub fn new(scan_job_id: Uuid, score: i32, summary: String, raw_data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_job_id,
            score,
            risk_level: RiskLevel::from_score(score),
            summary,
            tracker_count: 0,
            cookie_count: 0,
            external_domain_count: 0,
            pages_crawled: 1,
            is_https: false,
            has_csp: false,
            canvas_fingerprint: false,
            webgl_fingerprint: false,
            font_fingerprint: false,
            keylogger: false,
            raw_data,
            created_at: Utc::now().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::High);
    }

    #[test]
    fn risk_level_round_trips_through_strings() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Moderate,
            RiskLevel::Elevated,
            RiskLevel::High,
        ] {
            assert_eq!(level.to_string().parse::<RiskLevel>().unwrap(), level);
        }
    }

    #[test]
    fn new_report_derives_risk_from_score() {
        let report = ScanReport::new(
            Uuid::new_v4(),
            72,
            "ok".to_string(),
            serde_json::json!({}),
        );
        assert_eq!(report.risk_level, RiskLevel::Moderate);
    }
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 隐私评分
//!
//! 从100分起步按固定扣分表递减，结果裁剪到[0,100]。
//! 风险等级由分数经固定阈值确定性推导。

use serde::{Deserialize, Serialize};

/// 评分输入（全部来自捕获产物的确定性统计）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreInput {
    pub tracker_count: usize,
    pub cookie_count: usize,
    pub is_https: bool,
    pub has_csp: bool,
    pub canvas_fingerprint: bool,
    pub webgl_fingerprint: bool,
    pub font_fingerprint: bool,
    pub keylogger: bool,
    pub form_snooping: bool,
    pub beacon_count: usize,
    pub service_worker: bool,
    pub tracking_param_requests: usize,
    pub inline_tracker_count: usize,
}

/// 计算隐私评分
///
/// 扣分表：
/// - 每个追踪器 −8
/// - Cookie超过20个 −10
/// - 非HTTPS −20
/// - Canvas指纹 −15，WebGL −10，字体 −8
/// - 键盘监听 −15，表单窥探 −8
/// - 有beacon −8，注册Service Worker −5
/// - 有跟踪参数 −10
/// - 无CSP −5
/// - 有内联追踪脚本 −5
pub fn compute_score(input: &ScoreInput) -> i32 {
    let mut score: i32 = 100;

    score -= 8 * input.tracker_count as i32;

    if input.cookie_count > 20 {
        score -= 10;
    }
    if !input.is_https {
        score -= 20;
    }
    if input.canvas_fingerprint {
        score -= 15;
    }
    if input.webgl_fingerprint {
        score -= 10;
    }
    if input.font_fingerprint {
        score -= 8;
    }
    if input.keylogger {
        score -= 15;
    }
    if input.form_snooping {
        score -= 8;
    }
    if input.beacon_count > 0 {
        score -= 8;
    }
    if input.service_worker {
        score -= 5;
    }
    if input.tracking_param_requests > 0 {
        score -= 10;
    }
    if !input.has_csp {
        score -= 5;
    }
    if input.inline_tracker_count > 0 {
        score -= 5;
    }

    score.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::scan_report::RiskLevel;

    fn clean_input() -> ScoreInput {
        ScoreInput {
            is_https: true,
            has_csp: true,
            ..Default::default()
        }
    }

    #[test]
    fn clean_site_scores_full_marks() {
        assert_eq!(compute_score(&clean_input()), 100);
    }

    #[test]
    fn each_tracker_costs_eight_points() {
        let mut input = clean_input();
        input.tracker_count = 3;
        assert_eq!(compute_score(&input), 76);
    }

    #[test]
    fn score_never_goes_below_zero() {
        let input = ScoreInput {
            tracker_count: 20,
            cookie_count: 50,
            is_https: false,
            has_csp: false,
            canvas_fingerprint: true,
            webgl_fingerprint: true,
            font_fingerprint: true,
            keylogger: true,
            form_snooping: true,
            beacon_count: 5,
            service_worker: true,
            tracking_param_requests: 10,
            inline_tracker_count: 4,
        };

        assert_eq!(compute_score(&input), 0);
    }

    #[test]
    fn fingerprinting_deductions_stack() {
        let mut input = clean_input();
        input.canvas_fingerprint = true;
        input.webgl_fingerprint = true;
        input.font_fingerprint = true;
        assert_eq!(compute_score(&input), 100 - 15 - 10 - 8);
    }

    #[test]
    fn missing_https_and_csp_deduct() {
        let mut input = clean_input();
        input.is_https = false;
        input.has_csp = false;
        assert_eq!(compute_score(&input), 75);
    }

    #[test]
    fn risk_level_derivation_is_deterministic() {
        let mut input = clean_input();
        assert_eq!(RiskLevel::from_score(compute_score(&input)), RiskLevel::Low);

        // 5个追踪器 → 60分 → MODERATE
        input.tracker_count = 5;
        let score = compute_score(&input);
        assert_eq!(score, 60);
        assert_eq!(RiskLevel::from_score(score), RiskLevel::Moderate);

        // 继续加码 → ELEVATED以下
        input.keylogger = true;
        input.canvas_fingerprint = true;
        let score = compute_score(&input);
        assert_eq!(score, 30);
        assert_eq!(RiskLevel::from_score(score), RiskLevel::High);
    }

    #[test]
    fn same_input_scores_identically() {
        let mut input = clean_input();
        input.tracker_count = 2;
        input.beacon_count = 1;
        assert_eq!(compute_score(&input), compute_score(&input.clone()));
    }
}

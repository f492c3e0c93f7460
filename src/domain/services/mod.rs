// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 分析管线：对一次爬取的聚合产物做追踪器识别、Cookie审计、
/// 脚本情报、所有权图谱、安全信号和隐私评分
pub mod analysis_service;
pub mod cookie_service;
pub mod ownership_service;
pub mod scoring_service;
pub mod script_service;
pub mod signal_service;
pub mod tables;
pub mod tracker_service;

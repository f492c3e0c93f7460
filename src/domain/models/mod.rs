// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 包含扫描任务、扫描报告和队列任务等核心业务实体
pub mod queue_job;
pub mod scan_job;
pub mod scan_report;

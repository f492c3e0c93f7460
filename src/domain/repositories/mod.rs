// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的数据访问抽象，具体实现位于基础设施层
pub mod queue_job_repository;
pub mod scan_job_repository;
pub mod scan_result_repository;

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 基于SeaORM实现领域层定义的仓库接口
pub mod queue_job_repo_impl;
pub mod scan_job_repo_impl;
pub mod scan_result_repo_impl;

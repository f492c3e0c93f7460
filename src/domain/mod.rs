// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模块
///
/// 包含核心业务实体、分析服务和仓库接口
pub mod models;
pub mod repositories;
pub mod services;

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，提供对具体技术的抽象和封装。
/// 基础设施层负责与外部系统的交互，包括数据库、缓存和监控指标。
///
/// 包含的子模块：
/// - 缓存（cache）：Redis客户端和在途去重锁
/// - 数据库（database）：数据库连接和实体映射
/// - 指标（metrics）：进程计数器、耗时直方图和Prometheus导出
/// - 仓库实现（repositories）：领域仓库接口的SeaORM实现
///
/// 基础设施层遵循依赖倒置原则，依赖于领域层的抽象接口，
/// 确保领域层保持纯粹的业务逻辑，不受技术实现的影响。
pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;

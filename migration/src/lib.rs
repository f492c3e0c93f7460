// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_scan_jobs;
mod m20250601_000002_create_scan_results;
mod m20250601_000003_create_queue_jobs;
mod m20250601_000004_create_dead_letter_jobs;
mod m20250601_000005_create_indexes;

/// 数据库迁移器
///
/// 管理数据库模式迁移，负责数据库结构的版本控制
/// 包含所有数据库迁移的定义和执行逻辑
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    /// 获取所有迁移
    ///
    /// # 返回值
    ///
    /// 返回迁移列表
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_scan_jobs::Migration),
            Box::new(m20250601_000002_create_scan_results::Migration),
            Box::new(m20250601_000003_create_queue_jobs::Migration),
            Box::new(m20250601_000004_create_dead_letter_jobs::Migration),
            Box::new(m20250601_000005_create_indexes::Migration),
        ]
    }
}

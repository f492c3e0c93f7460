// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 扫描任务表迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    ///
    /// # 参数
    ///
    /// * `manager` - 数据库模式管理器
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 迁移成功
    /// * `Err(DbErr)` - 迁移失败
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScanJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScanJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScanJobs::UserId).uuid().null())
                    .col(ColumnDef::new(ScanJobs::TargetUrl).text().not_null())
                    .col(ColumnDef::new(ScanJobs::Status).string().not_null())
                    .col(ColumnDef::new(ScanJobs::ErrorMessage).text().null())
                    .col(ColumnDef::new(ScanJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ScanJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScanJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScanJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    /// 回滚数据库迁移
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanJobs::Table).to_owned())
            .await
    }
}

/// 扫描任务表字段定义
#[derive(DeriveIden)]
pub enum ScanJobs {
    Table,
    Id,
    UserId,
    TargetUrl,
    Status,
    ErrorMessage,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

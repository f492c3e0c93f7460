// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 队列任务表迁移
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
                    .table(QueueJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueueJobs::Url).text().not_null())
                    .col(ColumnDef::new(QueueJobs::Status).string().not_null())
                    .col(
                        ColumnDef::new(QueueJobs::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QueueJobs::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QueueJobs::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(QueueJobs::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(QueueJobs::LockToken).uuid())
                    .col(ColumnDef::new(QueueJobs::LockExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(QueueJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(QueueJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(QueueJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 队列轮询热路径索引
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_jobs_poll")
                    .table(QueueJobs::Table)
                    .col(QueueJobs::Status)
                    .col(QueueJobs::Priority)
                    .col(QueueJobs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    /// 回滚数据库迁移
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueueJobs::Table).to_owned())
            .await
    }
}

/// 队列任务表字段定义
#[derive(DeriveIden)]
pub enum QueueJobs {
    Table,
    Id,
    Url,
    Status,
    Priority,
    AttemptCount,
    MaxAttempts,
    ScheduledAt,
    LockToken,
    LockExpiresAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

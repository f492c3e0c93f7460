// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 死信队列表迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeadLetterJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeadLetterJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeadLetterJobs::OriginalJobId).uuid().not_null())
                    .col(ColumnDef::new(DeadLetterJobs::Url).text().not_null())
                    .col(ColumnDef::new(DeadLetterJobs::Error).text().not_null())
                    .col(
                        ColumnDef::new(DeadLetterJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeadLetterJobs::FailedAt)
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
            .drop_table(Table::drop().table(DeadLetterJobs::Table).to_owned())
            .await
    }
}

/// 死信队列表字段定义
#[derive(DeriveIden)]
pub enum DeadLetterJobs {
    Table,
    Id,
    OriginalJobId,
    Url,
    Error,
    Attempts,
    FailedAt,
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20250601_000001_create_scan_jobs::ScanJobs;

/// 扫描结果表迁移
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
                    .table(ScanResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScanResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScanResults::ScanJobId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ScanResults::Score).integer().not_null())
                    .col(ColumnDef::new(ScanResults::RiskLevel).string().not_null())
                    .col(ColumnDef::new(ScanResults::Summary).text().not_null())
                    .col(
                        ColumnDef::new(ScanResults::TrackerCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::CookieCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::ExternalDomainCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanResults::PagesCrawled)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ScanResults::IsHttps)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanResults::HasCsp)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanResults::CanvasFingerprint)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanResults::WebglFingerprint)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanResults::FontFingerprint)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanResults::Keylogger)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ScanResults::RawData).json_binary().not_null())
                    .col(
                        ColumnDef::new(ScanResults::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScanResults::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scan_results_job")
                            .from(ScanResults::Table, ScanResults::ScanJobId)
                            .to(ScanJobs::Table, ScanJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    /// 回滚数据库迁移
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanResults::Table).to_owned())
            .await
    }
}

/// 扫描结果表字段定义
#[derive(DeriveIden)]
pub enum ScanResults {
    Table,
    Id,
    ScanJobId,
    Score,
    RiskLevel,
    Summary,
    TrackerCount,
    CookieCount,
    ExternalDomainCount,
    PagesCrawled,
    IsHttps,
    HasCsp,
    CanvasFingerprint,
    WebglFingerprint,
    FontFingerprint,
    Keylogger,
    RawData,
    CreatedAt,
    UpdatedAt,
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20250601_000001_create_scan_jobs::ScanJobs;
use crate::m20250601_000002_create_scan_results::ScanResults;

/// 查询索引迁移
///
/// 为扫描任务和扫描结果表创建查询热路径索引
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_scan_jobs_target_url")
                    .table(ScanJobs::Table)
                    .col(ScanJobs::TargetUrl)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_jobs_status")
                    .table(ScanJobs::Table)
                    .col(ScanJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_jobs_user")
                    .table(ScanJobs::Table)
                    .col(ScanJobs::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_jobs_created_desc")
                    .table(ScanJobs::Table)
                    .col((ScanJobs::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // 去重窗口查询：按URL找最近一次成功
        manager
            .create_index(
                Index::create()
                    .name("idx_scan_jobs_url_created_desc")
                    .table(ScanJobs::Table)
                    .col(ScanJobs::TargetUrl)
                    .col((ScanJobs::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_results_score")
                    .table(ScanResults::Table)
                    .col(ScanResults::Score)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_results_risk_level")
                    .table(ScanResults::Table)
                    .col(ScanResults::RiskLevel)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_results_created_desc")
                    .table(ScanResults::Table)
                    .col((ScanResults::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_results_canvas")
                    .table(ScanResults::Table)
                    .col(ScanResults::CanvasFingerprint)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_results_keylogger")
                    .table(ScanResults::Table)
                    .col(ScanResults::Keylogger)
                    .to_owned(),
            )
            .await
    }

    /// 回滚数据库迁移
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_scan_jobs_target_url",
            "idx_scan_jobs_status",
            "idx_scan_jobs_user",
            "idx_scan_jobs_created_desc",
            "idx_scan_jobs_url_created_desc",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(ScanJobs::Table).to_owned())
                .await?;
        }

        for name in [
            "idx_scan_results_score",
            "idx_scan_results_risk_level",
            "idx_scan_results_created_desc",
            "idx_scan_results_canvas",
            "idx_scan_results_keylogger",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(ScanResults::Table).to_owned())
                .await?;
        }

        Ok(())
    }
}

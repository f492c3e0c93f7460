// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scan_report::ScanReport;
use crate::domain::repositories::scan_job_repository::RepositoryError;
use crate::domain::repositories::scan_result_repository::ScanResultRepository;
use crate::infrastructure::database::entities::scan_result;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

/// 扫描结果仓库实现
#[derive(Clone)]
pub struct ScanResultRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ScanResultRepositoryImpl {
    /// 创建新的扫描结果仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<scan_result::Model> for ScanReport {
    fn from(model: scan_result::Model) -> Self {
        Self {
            id: model.id,
            scan_job_id: model.scan_job_id,
            score: model.score,
            risk_level: model
                .risk_level
                .parse()
                .unwrap_or(crate::domain::models::scan_report::RiskLevel::High),
            summary: model.summary,
            tracker_count: model.tracker_count,
            cookie_count: model.cookie_count,
            external_domain_count: model.external_domain_count,
            pages_crawled: model.pages_crawled,
            is_https: model.is_https,
            has_csp: model.has_csp,
            canvas_fingerprint: model.canvas_fingerprint,
            webgl_fingerprint: model.webgl_fingerprint,
            font_fingerprint: model.font_fingerprint,
            keylogger: model.keylogger,
            raw_data: model.raw_data,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl ScanResultRepository for ScanResultRepositoryImpl {
    async fn find_by_job_id(
        &self,
        scan_job_id: Uuid,
    ) -> Result<Option<ScanReport>, RepositoryError> {
        let model = scan_result::Entity::find()
            .filter(scan_result::Column::ScanJobId.eq(scan_job_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }
}

// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scan_report::ScanReport;
use crate::domain::repositories::scan_job_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 扫描结果仓库特质
///
/// 报告的创建发生在任务完成事务内（见 `ScanJobRepository::complete_with_report`），
/// 本接口只承担读路径。
#[async_trait]
pub trait ScanResultRepository: Send + Sync {
    /// 根据扫描任务ID查找报告
    async fn find_by_job_id(&self, scan_job_id: Uuid)
        -> Result<Option<ScanReport>, RepositoryError>;
}

#[async_trait]
impl<T: ScanResultRepository + ?Sized> ScanResultRepository for std::sync::Arc<T> {
    async fn find_by_job_id(
        &self,
        scan_job_id: Uuid,
    ) -> Result<Option<ScanReport>, RepositoryError> {
        (**self).find_by_job_id(scan_job_id).await
    }
}

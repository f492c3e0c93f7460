// Copyright 2025 scanrs contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scan_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub scan_job_id: Uuid,
    pub score: i32,
    pub risk_level: String,
    pub summary: String,
    pub tracker_count: i32,
    pub cookie_count: i32,
    pub external_domain_count: i32,
    pub pages_crawled: i32,
    pub is_https: bool,
    pub has_csp: bool,
    pub canvas_fingerprint: bool,
    pub webgl_fingerprint: bool,
    pub font_fingerprint: bool,
    pub keylogger: bool,
    pub raw_data: Json,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scan_job::Entity",
        from = "Column::ScanJobId",
        to = "super::scan_job::Column::Id",
        on_delete = "Cascade"
    )]
    ScanJob,
}

impl Related<super::scan_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScanJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

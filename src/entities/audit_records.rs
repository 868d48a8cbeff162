use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    #[sea_orm(string_value = "submission")]
    Submission,
    #[sea_orm(string_value = "system_notification")]
    SystemNotification,
    #[sea_orm(string_value = "admin_notification")]
    AdminNotification,
    #[sea_orm(string_value = "winning_entry")]
    WinningEntry,
    #[sea_orm(string_value = "submitter")]
    Submitter,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditCategory::Submission => write!(f, "submission"),
            AuditCategory::SystemNotification => write!(f, "system_notification"),
            AuditCategory::AdminNotification => write!(f, "admin_notification"),
            AuditCategory::WinningEntry => write!(f, "winning_entry"),
            AuditCategory::Submitter => write!(f, "submitter"),
        }
    }
}

/// Append-only log line. Rows are inserted and never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category: AuditCategory,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

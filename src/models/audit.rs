use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{AuditCategory, audit_record_entity as audit_records};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecordResponse {
    pub id: i32,
    pub category: AuditCategory,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<audit_records::Model> for AuditRecordResponse {
    fn from(m: audit_records::Model) -> Self {
        AuditRecordResponse {
            id: m.id,
            category: m.category,
            message: m.message,
            created_at: m.created_at,
        }
    }
}

use crate::entities::{AuditCategory, audit_record_entity as audit_records};
use crate::error::AppResult;
use crate::models::{AuditRecordResponse, PaginatedResponse, PaginationParams};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryOrder, QuerySelect, Set,
};

/// Append an audit line on `db`, normally the caller's open transaction so
/// the record commits or rolls back with the change it describes.
pub async fn record_audit<C>(
    db: &C,
    category: AuditCategory,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<audit_records::Model, DbErr>
where
    C: ConnectionTrait,
{
    audit_records::ActiveModel {
        category: Set(category),
        message: Set(message.into()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[derive(Clone)]
pub struct AuditService {
    pool: DatabaseConnection,
}

impl AuditService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 审计记录（分页，倒序）
    pub async fn list_records(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<AuditRecordResponse>> {
        let total = audit_records::Entity::find().count(&self.pool).await?;

        let items = audit_records::Entity::find()
            .order_by_desc(audit_records::Column::CreatedAt)
            .order_by_desc(audit_records::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_records_newest_first() {
        let pool = create_test_pool().await;
        let t0 = Utc::now();
        record_audit(&pool, AuditCategory::Submission, "first", t0)
            .await
            .unwrap();
        record_audit(
            &pool,
            AuditCategory::WinningEntry,
            "second",
            t0 + Duration::seconds(1),
        )
        .await
        .unwrap();
        record_audit(
            &pool,
            AuditCategory::Submitter,
            "third",
            t0 + Duration::seconds(2),
        )
        .await
        .unwrap();

        let service = AuditService::new(pool);
        let page = service
            .list_records(&PaginationParams::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let messages: Vec<_> = page.data.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second"]);
        assert_eq!(page.data[1].category, AuditCategory::WinningEntry);
    }
}

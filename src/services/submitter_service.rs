use crate::entities::{
    AuditCategory, submission_entity as submissions, submitter_entity as submitters,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateSubmitterRequest, PaginatedResponse, PaginationParams, SubmissionResponse,
    SubmitterResponse,
};
use crate::services::{is_unique_violation, record_audit};
use crate::utils::{RaffleNumberPolicy, validate_phone_number};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};

/// Staff-side maintenance of submitters and their submissions.
#[derive(Clone)]
pub struct SubmitterService {
    pool: DatabaseConnection,
    policy: RaffleNumberPolicy,
}

impl SubmitterService {
    pub fn new(pool: DatabaseConnection, policy: RaffleNumberPolicy) -> Self {
        Self { pool, policy }
    }

    pub async fn list_submitters(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<SubmitterResponse>> {
        let total = submitters::Entity::find().count(&self.pool).await?;

        let page = submitters::Entity::find()
            .order_by_asc(submitters::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        let ids: Vec<i32> = page.iter().map(|s| s.id).collect();
        let mut grouped: HashMap<i32, Vec<submissions::Model>> = HashMap::new();
        if !ids.is_empty() {
            let rows = submissions::Entity::find()
                .filter(submissions::Column::SubmitterId.is_in(ids))
                .order_by_asc(submissions::Column::Id)
                .all(&self.pool)
                .await?;
            for row in rows {
                grouped.entry(row.submitter_id).or_default().push(row);
            }
        }

        let data = page
            .into_iter()
            .map(|s| {
                let rows = grouped.remove(&s.id).unwrap_or_default();
                SubmitterResponse::new(s, rows)
            })
            .collect();

        Ok(PaginatedResponse::new(data, params, total))
    }

    pub async fn get_submitter(&self, id: i32) -> AppResult<SubmitterResponse> {
        let submitter = submitters::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submitter {id} not found")))?;

        let rows = submissions::Entity::find()
            .filter(submissions::Column::SubmitterId.eq(id))
            .order_by_asc(submissions::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(SubmitterResponse::new(submitter, rows))
    }

    /// Manually register a phone number, optionally with raffle numbers.
    pub async fn create_submitter(
        &self,
        request: CreateSubmitterRequest,
        now: DateTime<Utc>,
    ) -> AppResult<SubmitterResponse> {
        let phone_number = validate_phone_number(&request.phone_number)?;
        // 去重并保持有序
        let raffle_numbers: BTreeSet<String> = request
            .raffle_numbers
            .iter()
            .map(|n| self.policy.validate(n))
            .collect::<AppResult<_>>()?;

        let txn = self.pool.begin().await?;

        let existing = submitters::Entity::find()
            .filter(submitters::Column::PhoneNumber.eq(phone_number.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Submitter {phone_number} already exists"
            )));
        }

        let submitter = submitters::ActiveModel {
            phone_number: Set(phone_number.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Submitter {phone_number} already exists"))
            } else {
                e.into()
            }
        })?;

        record_audit(
            &txn,
            AuditCategory::Submitter,
            format!("Submitter {phone_number} created by admin"),
            now,
        )
        .await?;

        let mut rows = Vec::with_capacity(raffle_numbers.len());
        for raffle_number in &raffle_numbers {
            rows.push(insert_admin_submission(&txn, &submitter, raffle_number, now).await?);
        }

        txn.commit().await?;

        log::info!(
            "Admin created submitter {phone_number} with {} raffle number(s)",
            rows.len()
        );
        Ok(SubmitterResponse::new(submitter, rows))
    }

    /// Correct a submitter's phone number.
    pub async fn update_phone(
        &self,
        id: i32,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SubmitterResponse> {
        let phone_number = validate_phone_number(phone_number)?;

        let txn = self.pool.begin().await?;

        let submitter = submitters::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submitter {id} not found")))?;
        let previous = submitter.phone_number.clone();

        let taken = submitters::Entity::find()
            .filter(submitters::Column::PhoneNumber.eq(phone_number.as_str()))
            .filter(submitters::Column::Id.ne(id))
            .one(&txn)
            .await?;
        if taken.is_some() {
            txn.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Submitter {phone_number} already exists"
            )));
        }

        let mut am = submitter.into_active_model();
        am.phone_number = Set(phone_number.clone());
        am.updated_at = Set(now);
        let updated = am.update(&txn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Submitter {phone_number} already exists"))
            } else {
                e.into()
            }
        })?;

        record_audit(
            &txn,
            AuditCategory::Submitter,
            format!("Submitter {id} phone number changed from {previous} to {phone_number}"),
            now,
        )
        .await?;

        txn.commit().await?;

        self.get_submitter(updated.id).await
    }

    /// Remove a submitter together with every submission it made.
    pub async fn delete_submitter(&self, id: i32, now: DateTime<Utc>) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let submitter = submitters::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submitter {id} not found")))?;

        // SQLite 默认不启用外键级联，显式删除
        let removed = submissions::Entity::delete_many()
            .filter(submissions::Column::SubmitterId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        submitters::Entity::delete_by_id(id).exec(&txn).await?;

        record_audit(
            &txn,
            AuditCategory::Submitter,
            format!(
                "Submitter {} deleted with {removed} submission(s)",
                submitter.phone_number
            ),
            now,
        )
        .await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn add_submission(
        &self,
        submitter_id: i32,
        raffle_number: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SubmissionResponse> {
        let raffle_number = self.policy.validate(raffle_number)?;

        let txn = self.pool.begin().await?;

        let submitter = submitters::Entity::find_by_id(submitter_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submitter {submitter_id} not found")))?;

        let duplicate = submissions::Entity::find()
            .filter(submissions::Column::SubmitterId.eq(submitter_id))
            .filter(submissions::Column::RaffleNumber.eq(raffle_number.as_str()))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            txn.rollback().await?;
            return Err(AppError::Conflict(format!(
                "{} already submitted raffle number {raffle_number}",
                submitter.phone_number
            )));
        }

        let row = insert_admin_submission(&txn, &submitter, &raffle_number, now).await?;

        let mut am = submitter.into_active_model();
        am.updated_at = Set(now);
        am.update(&txn).await?;

        txn.commit().await?;
        Ok(row.into())
    }

    pub async fn delete_submission(&self, id: i32, now: DateTime<Utc>) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let (submission, submitter) = submissions::Entity::find_by_id(id)
            .find_also_related(submitters::Entity)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))?;

        submissions::Entity::delete_by_id(id).exec(&txn).await?;

        let phone_number = submitter
            .map(|s| s.phone_number)
            .unwrap_or_else(|| format!("submitter {}", submission.submitter_id));
        record_audit(
            &txn,
            AuditCategory::Submission,
            format!(
                "Submission of raffle number {} by {phone_number} deleted by admin",
                submission.raffle_number
            ),
            now,
        )
        .await?;

        txn.commit().await?;
        Ok(())
    }
}

async fn insert_admin_submission(
    txn: &DatabaseTransaction,
    submitter: &submitters::Model,
    raffle_number: &str,
    now: DateTime<Utc>,
) -> AppResult<submissions::Model> {
    let row = submissions::ActiveModel {
        submitter_id: Set(submitter.id),
        raffle_number: Set(raffle_number.to_string()),
        system_notification_count: Set(0),
        admin_notification_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "{} already submitted raffle number {raffle_number}",
                submitter.phone_number
            ))
        } else {
            e.into()
        }
    })?;

    record_audit(
        txn,
        AuditCategory::Submission,
        format!(
            "Admin added raffle number {raffle_number} for {}",
            submitter.phone_number
        ),
        now,
    )
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::entities::audit_record_entity as audit_records;

    fn service(pool: &DatabaseConnection) -> SubmitterService {
        SubmitterService::new(
            pool.clone(),
            RaffleNumberPolicy::new(r"^[0-9]{4,5}$").unwrap(),
        )
    }

    fn create_request(phone: &str, numbers: &[&str]) -> CreateSubmitterRequest {
        CreateSubmitterRequest {
            phone_number: phone.to_string(),
            raffle_numbers: numbers.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_submitter() {
        let pool = create_test_pool().await;
        let svc = service(&pool);

        let created = svc
            .create_submitter(
                create_request(" +18085551234 ", &["4242", "1111", "4242"]),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(created.phone_number, "+18085551234");
        let numbers: Vec<_> = created
            .submissions
            .iter()
            .map(|s| s.raffle_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["1111", "4242"]);

        let fetched = svc.get_submitter(created.id).await.unwrap();
        assert_eq!(fetched.submissions.len(), 2);

        let err = svc
            .create_submitter(create_request("+18085551234", &[]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = svc
            .create_submitter(create_request("+18085550000", &["12"]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = svc
            .create_submitter(create_request("not a phone", &[]), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_list_groups_submissions() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        svc.create_submitter(create_request("+18085551234", &["4242"]), Utc::now())
            .await
            .unwrap();
        svc.create_submitter(create_request("+18085555678", &["1111", "2222"]), Utc::now())
            .await
            .unwrap();

        let page = svc
            .list_submitters(&PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.data[0].submissions.len(), 1);
        assert_eq!(page.data[1].submissions.len(), 2);
    }

    #[tokio::test]
    async fn test_update_phone() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = svc
            .create_submitter(create_request("+18085551234", &[]), Utc::now())
            .await
            .unwrap();
        svc.create_submitter(create_request("+18085555678", &[]), Utc::now())
            .await
            .unwrap();

        let updated = svc
            .update_phone(a.id, "+18085550000", Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.phone_number, "+18085550000");

        let err = svc
            .update_phone(a.id, "+18085555678", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = svc
            .update_phone(999, "+18085550001", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_and_delete_submissions() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = svc
            .create_submitter(create_request("+18085551234", &["4242"]), Utc::now())
            .await
            .unwrap();

        let added = svc.add_submission(a.id, "1111", Utc::now()).await.unwrap();
        assert_eq!(added.raffle_number, "1111");
        assert_eq!(added.submitter_id, a.id);

        let err = svc
            .add_submission(a.id, "4242", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        svc.delete_submission(added.id, Utc::now()).await.unwrap();
        assert_eq!(svc.get_submitter(a.id).await.unwrap().submissions.len(), 1);

        let err = svc.delete_submission(added.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_submitter_removes_submissions() {
        let pool = create_test_pool().await;
        let svc = service(&pool);
        let a = svc
            .create_submitter(create_request("+18085551234", &["4242", "1111"]), Utc::now())
            .await
            .unwrap();

        svc.delete_submitter(a.id, Utc::now()).await.unwrap();

        assert_eq!(submissions::Entity::find().count(&pool).await.unwrap(), 0);
        assert!(matches!(
            svc.get_submitter(a.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let deleted_audit = audit_records::Entity::find()
            .filter(audit_records::Column::Category.eq(AuditCategory::Submitter))
            .order_by_desc(audit_records::Column::Id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert!(deleted_audit.message.contains("2 submission(s)"));
    }
}

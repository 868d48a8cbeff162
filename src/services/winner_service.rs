use crate::entities::{
    AuditCategory, submission_entity as submissions, submitter_entity as submitters,
    winning_entry_entity as winning_entries,
};
use crate::error::{AppError, AppResult};
use crate::external::SmsSender;
use crate::models::{
    CreateWinningEntryRequest, DrawingWindow, NotifyWinnerResponse, PaginatedResponse,
    PaginationParams, UpdateWinningEntryRequest, WinnerBoardResponse, WinningEntryQuery,
    WinningEntryResponse, validate_item,
};
use crate::services::{is_unique_violation, record_audit};
use crate::utils::RaffleNumberPolicy;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct WinnerService {
    pool: DatabaseConnection,
    policy: RaffleNumberPolicy,
    window: DrawingWindow,
    sender: Arc<dyn SmsSender>,
    winner_copy: String,
}

fn map_unique_violation(e: DbErr, raffle_number: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("Raffle number {raffle_number} was already drawn"))
    } else {
        e.into()
    }
}

impl WinnerService {
    pub fn new(
        pool: DatabaseConnection,
        policy: RaffleNumberPolicy,
        window: DrawingWindow,
        sender: Arc<dyn SmsSender>,
        winner_copy: String,
    ) -> Self {
        Self {
            pool,
            policy,
            window,
            sender,
            winner_copy,
        }
    }

    /// 中奖号码列表（可按领取状态过滤）
    pub async fn list_entries(
        &self,
        query: &WinningEntryQuery,
    ) -> AppResult<PaginatedResponse<WinningEntryResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = winning_entries::Entity::find();
        if let Some(claimed) = query.claimed {
            base_query = base_query.filter(winning_entries::Column::IsClaimed.eq(claimed));
        }

        let total = base_query.clone().count(&self.pool).await?;

        let items = base_query
            .order_by_asc(winning_entries::Column::RaffleTime)
            .order_by_asc(winning_entries::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            &params,
            total,
        ))
    }

    /// Public board: unclaimed and claimed winners
    pub async fn board(&self) -> AppResult<WinnerBoardResponse> {
        let entries = winning_entries::Entity::find()
            .order_by_asc(winning_entries::Column::RaffleTime)
            .order_by_asc(winning_entries::Column::Id)
            .all(&self.pool)
            .await?;

        let (claimed, unclaimed): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| entry.is_claimed);

        Ok(WinnerBoardResponse {
            unclaimed: unclaimed.into_iter().map(Into::into).collect(),
            claimed: claimed.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn get_entry(&self, id: i32) -> AppResult<WinningEntryResponse> {
        let entry = winning_entries::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winning entry {id} not found")))?;
        Ok(entry.into())
    }

    /// Draw a raffle number as a winner.
    pub async fn draw(
        &self,
        request: CreateWinningEntryRequest,
        now: DateTime<Utc>,
    ) -> AppResult<WinningEntryResponse> {
        let raffle_number = self.policy.validate(&request.raffle_number)?;
        let item = validate_item(&request.item)?;
        self.window.check(request.raffle_time)?;

        let txn = self.pool.begin().await?;

        let existing = winning_entries::Entity::find()
            .filter(winning_entries::Column::RaffleNumber.eq(raffle_number.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Raffle number {raffle_number} was already drawn"
            )));
        }

        let entry = winning_entries::ActiveModel {
            raffle_number: Set(raffle_number.clone()),
            item: Set(item.clone()),
            raffle_time: Set(request.raffle_time),
            is_claimed: Set(false),
            system_notification_count: Set(0),
            admin_notification_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, &raffle_number))?;

        record_audit(
            &txn,
            AuditCategory::WinningEntry,
            format!("Raffle number {raffle_number} drawn for prize {item}"),
            now,
        )
        .await?;

        txn.commit().await?;

        log::info!("Raffle number {raffle_number} drawn for prize {item}");
        Ok(entry.into())
    }

    pub async fn update_entry(
        &self,
        id: i32,
        request: UpdateWinningEntryRequest,
        now: DateTime<Utc>,
    ) -> AppResult<WinningEntryResponse> {
        let raffle_number = request
            .raffle_number
            .as_deref()
            .map(|n| self.policy.validate(n))
            .transpose()?;
        let item = request.item.as_deref().map(validate_item).transpose()?;
        if request.raffle_time.is_some() {
            self.window.check(request.raffle_time)?;
        }

        let txn = self.pool.begin().await?;

        let entry = winning_entries::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winning entry {id} not found")))?;
        let previous_number = entry.raffle_number.clone();

        if let Some(number) = &raffle_number {
            let taken = winning_entries::Entity::find()
                .filter(winning_entries::Column::RaffleNumber.eq(number.as_str()))
                .filter(winning_entries::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if taken.is_some() {
                txn.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Raffle number {number} was already drawn"
                )));
            }
        }

        let mut am = entry.into_active_model();
        if let Some(number) = &raffle_number {
            am.raffle_number = Set(number.clone());
        }
        if let Some(item) = &item {
            am.item = Set(item.clone());
        }
        if let Some(time) = request.raffle_time {
            am.raffle_time = Set(Some(time));
        }
        if let Some(claimed) = request.is_claimed {
            am.is_claimed = Set(claimed);
        }
        am.updated_at = Set(now);

        let updated = am
            .update(&txn)
            .await
            .map_err(|e| map_unique_violation(e, raffle_number.as_deref().unwrap_or_default()))?;

        record_audit(
            &txn,
            AuditCategory::WinningEntry,
            format!(
                "Winning entry {id} edited: raffle number {previous_number} -> {}, prize {}, claimed {}",
                updated.raffle_number, updated.item, updated.is_claimed
            ),
            now,
        )
        .await?;

        txn.commit().await?;
        Ok(updated.into())
    }

    /// Mark a prize as claimed or unclaimed.
    pub async fn set_claimed(
        &self,
        id: i32,
        claimed: bool,
        now: DateTime<Utc>,
    ) -> AppResult<WinningEntryResponse> {
        let txn = self.pool.begin().await?;

        let entry = winning_entries::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winning entry {id} not found")))?;
        let raffle_number = entry.raffle_number.clone();

        let mut am = entry.into_active_model();
        am.is_claimed = Set(claimed);
        am.updated_at = Set(now);
        let updated = am.update(&txn).await?;

        let verb = if claimed { "claimed" } else { "unclaimed" };
        record_audit(
            &txn,
            AuditCategory::WinningEntry,
            format!("Prize for raffle number {raffle_number} marked {verb}"),
            now,
        )
        .await?;

        txn.commit().await?;
        Ok(updated.into())
    }

    pub async fn delete_entry(&self, id: i32, now: DateTime<Utc>) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let entry = winning_entries::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winning entry {id} not found")))?;

        winning_entries::Entity::delete_by_id(id).exec(&txn).await?;

        record_audit(
            &txn,
            AuditCategory::WinningEntry,
            format!(
                "Winning entry for raffle number {} ({}) deleted",
                entry.raffle_number, entry.item
            ),
            now,
        )
        .await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn notify_entry(&self, id: i32, now: DateTime<Utc>) -> AppResult<NotifyWinnerResponse> {
        let entry = winning_entries::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winning entry {id} not found")))?;
        // 已存的号码不再按当前规则校验
        self.notify_stored_entry(entry, now).await
    }

    /// Text every submitter of `raffle_number` the winner copy.
    ///
    /// Delivered messages bump the submission's admin counter and write an
    /// audit line; the winning entry's admin counter goes up once per call
    /// when at least one message went out. No submitters is a warning, not
    /// an error, and writes nothing.
    pub async fn notify_winner(
        &self,
        raffle_number: &str,
        now: DateTime<Utc>,
    ) -> AppResult<NotifyWinnerResponse> {
        let raffle_number = self.policy.validate(raffle_number)?;

        let entry = winning_entries::Entity::find()
            .filter(winning_entries::Column::RaffleNumber.eq(raffle_number.as_str()))
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Raffle number {raffle_number} has not been drawn"))
            })?;

        self.notify_stored_entry(entry, now).await
    }

    async fn notify_stored_entry(
        &self,
        entry: winning_entries::Model,
        now: DateTime<Utc>,
    ) -> AppResult<NotifyWinnerResponse> {
        let raffle_number = entry.raffle_number.clone();

        let recipients = submissions::Entity::find()
            .filter(submissions::Column::RaffleNumber.eq(raffle_number.as_str()))
            .find_also_related(submitters::Entity)
            .order_by_asc(submissions::Column::Id)
            .all(&self.pool)
            .await?;

        if recipients.is_empty() {
            log::warn!("No submitters found for raffle number {raffle_number}, nothing to notify");
            return Ok(NotifyWinnerResponse {
                raffle_number: raffle_number.clone(),
                notified_count: 0,
                failed: Vec::new(),
                warning: Some(format!(
                    "No submitters found for raffle number {raffle_number}"
                )),
            });
        }

        // 先发送短信，再在一个事务里落库
        let mut delivered: Vec<(i32, String)> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        for (submission, submitter) in recipients {
            let Some(submitter) = submitter else {
                log::error!(
                    "Submission {} references missing submitter {}",
                    submission.id,
                    submission.submitter_id
                );
                continue;
            };
            match self
                .sender
                .send(&submitter.phone_number, &self.winner_copy)
                .await
            {
                Ok(()) => delivered.push((submission.id, submitter.phone_number)),
                Err(e) => {
                    log::error!(
                        "Failed to notify {} of winning raffle number {raffle_number}: {e}",
                        submitter.phone_number
                    );
                    failed.push(submitter.phone_number);
                }
            }
        }

        let txn = self.pool.begin().await?;

        for (submission_id, phone_number) in &delivered {
            submissions::Entity::update_many()
                .col_expr(
                    submissions::Column::AdminNotificationCount,
                    Expr::col(submissions::Column::AdminNotificationCount).add(1),
                )
                .col_expr(submissions::Column::UpdatedAt, Expr::value(now))
                .filter(submissions::Column::Id.eq(*submission_id))
                .exec(&txn)
                .await?;

            record_audit(
                &txn,
                AuditCategory::AdminNotification,
                format!(
                    "Admin notification sent to {phone_number} for raffle number {raffle_number} (prize: {})",
                    entry.item
                ),
                now,
            )
            .await?;
        }

        for phone_number in &failed {
            record_audit(
                &txn,
                AuditCategory::AdminNotification,
                format!(
                    "Admin notification to {phone_number} for raffle number {raffle_number} failed"
                ),
                now,
            )
            .await?;
        }

        if !delivered.is_empty() {
            winning_entries::Entity::update_many()
                .col_expr(
                    winning_entries::Column::AdminNotificationCount,
                    Expr::col(winning_entries::Column::AdminNotificationCount).add(1),
                )
                .col_expr(winning_entries::Column::UpdatedAt, Expr::value(now))
                .filter(winning_entries::Column::Id.eq(entry.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        let warning = if delivered.is_empty() {
            Some(format!(
                "No notification for raffle number {raffle_number} could be delivered"
            ))
        } else {
            None
        };

        log::info!(
            "Notified {} submitter(s) of winning raffle number {raffle_number}, {} failed",
            delivered.len(),
            failed.len()
        );

        Ok(NotifyWinnerResponse {
            raffle_number,
            notified_count: delivered.len(),
            failed,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_test_pool;
    use crate::entities::audit_record_entity as audit_records;
    use crate::external::testing::RecordingSender;
    use chrono::TimeZone;

    fn policy() -> RaffleNumberPolicy {
        RaffleNumberPolicy::new(r"^[0-9]{4,5}$").unwrap()
    }

    fn service(pool: &DatabaseConnection, sender: Arc<RecordingSender>) -> WinnerService {
        WinnerService::new(
            pool.clone(),
            policy(),
            DrawingWindow::default(),
            sender,
            "WINNER! WINNER! CHICKEN DINNER!".to_string(),
        )
    }

    fn draw_request(raffle_number: &str, item: &str) -> CreateWinningEntryRequest {
        CreateWinningEntryRequest {
            raffle_number: raffle_number.to_string(),
            item: item.to_string(),
            raffle_time: None,
        }
    }

    async fn submit(pool: &DatabaseConnection, phone: &str, raffle_number: &str) -> i32 {
        let now = Utc::now();
        let submitter = match submitters::Entity::find()
            .filter(submitters::Column::PhoneNumber.eq(phone))
            .one(pool)
            .await
            .unwrap()
        {
            Some(s) => s,
            None => submitters::ActiveModel {
                phone_number: Set(phone.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(pool)
            .await
            .unwrap(),
        };
        submissions::ActiveModel {
            submitter_id: Set(submitter.id),
            raffle_number: Set(raffle_number.to_string()),
            system_notification_count: Set(0),
            admin_notification_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(pool)
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_draw_and_duplicate_conflict() {
        let pool = create_test_pool().await;
        let svc = service(&pool, Arc::new(RecordingSender::default()));

        let entry = svc
            .draw(draw_request(" 4242 ", " T-shirt "), Utc::now())
            .await
            .unwrap();
        assert_eq!(entry.raffle_number, "4242");
        assert_eq!(entry.item, "T-shirt");
        assert!(!entry.is_claimed);

        let err = svc
            .draw(draw_request("4242", "Mug"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = svc
            .draw(draw_request("42", "Mug"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = svc
            .draw(draw_request("5555", "  "), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_draw_respects_window() {
        let pool = create_test_pool().await;
        let svc = WinnerService::new(
            pool.clone(),
            policy(),
            DrawingWindow {
                start: Some(Utc.with_ymd_and_hms(2015, 5, 14, 0, 0, 0).unwrap()),
                end: Some(Utc.with_ymd_and_hms(2015, 5, 16, 0, 0, 0).unwrap()),
            },
            Arc::new(RecordingSender::default()),
            "win".to_string(),
        );
        let mut request = draw_request("4242", "T-shirt");
        request.raffle_time = Some(Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            svc.draw(request, Utc::now()).await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_claim_unclaim_and_board() {
        let pool = create_test_pool().await;
        let svc = service(&pool, Arc::new(RecordingSender::default()));
        let a = svc.draw(draw_request("1111", "Mug"), Utc::now()).await.unwrap();
        svc.draw(draw_request("2222", "Hat"), Utc::now()).await.unwrap();

        let claimed = svc.set_claimed(a.id, true, Utc::now()).await.unwrap();
        assert!(claimed.is_claimed);

        let board = svc.board().await.unwrap();
        assert_eq!(board.claimed.len(), 1);
        assert_eq!(board.claimed[0].raffle_number, "1111");
        assert_eq!(board.unclaimed.len(), 1);
        assert_eq!(board.unclaimed[0].raffle_number, "2222");

        let page = svc
            .list_entries(&WinningEntryQuery {
                claimed: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let unclaimed = svc.set_claimed(a.id, false, Utc::now()).await.unwrap();
        assert!(!unclaimed.is_claimed);

        assert!(matches!(
            svc.set_claimed(999, true, Utc::now()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = create_test_pool().await;
        let svc = service(&pool, Arc::new(RecordingSender::default()));
        let a = svc.draw(draw_request("1111", "Mug"), Utc::now()).await.unwrap();
        svc.draw(draw_request("2222", "Hat"), Utc::now()).await.unwrap();

        let updated = svc
            .update_entry(
                a.id,
                UpdateWinningEntryRequest {
                    item: Some("Big mug".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.item, "Big mug");
        assert_eq!(updated.raffle_number, "1111");

        let err = svc
            .update_entry(
                a.id,
                UpdateWinningEntryRequest {
                    raffle_number: Some("2222".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        svc.delete_entry(a.id, Utc::now()).await.unwrap();
        assert!(matches!(
            svc.get_entry(a.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_notify_without_submitters_is_noop() {
        let pool = create_test_pool().await;
        let sender = Arc::new(RecordingSender::default());
        let svc = service(&pool, sender.clone());
        let entry = svc.draw(draw_request("4242", "T-shirt"), Utc::now()).await.unwrap();
        let audits_before = audit_records::Entity::find().count(&pool).await.unwrap();

        let result = svc.notify_winner("4242", Utc::now()).await.unwrap();
        assert_eq!(result.notified_count, 0);
        assert!(result.warning.is_some());
        assert!(sender.sent().is_empty());

        let entry = winning_entries::Entity::find_by_id(entry.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.admin_notification_count, 0);
        assert_eq!(
            audit_records::Entity::find().count(&pool).await.unwrap(),
            audits_before
        );
    }

    #[tokio::test]
    async fn test_notify_counts_each_submission_once_and_entry_once() {
        let pool = create_test_pool().await;
        let sender = Arc::new(RecordingSender::default());
        let svc = service(&pool, sender.clone());
        let entry = svc.draw(draw_request("4242", "T-shirt"), Utc::now()).await.unwrap();

        let s1 = submit(&pool, "+18085551234", "4242").await;
        let s2 = submit(&pool, "+18085555678", "4242").await;
        let other = submit(&pool, "+18085555678", "1111").await;

        let result = svc.notify_entry(entry.id, Utc::now()).await.unwrap();
        assert_eq!(result.notified_count, 2);
        assert!(result.failed.is_empty());
        assert!(result.warning.is_none());

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, body)| body == "WINNER! WINNER! CHICKEN DINNER!"));

        for (id, expected) in [(s1, 1), (s2, 1), (other, 0)] {
            let row = submissions::Entity::find_by_id(id)
                .one(&pool)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.admin_notification_count, expected);
        }

        let reloaded = winning_entries::Entity::find_by_id(entry.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.admin_notification_count, 1);

        svc.notify_winner("4242", Utc::now()).await.unwrap();
        let reloaded = winning_entries::Entity::find_by_id(entry.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.admin_notification_count, 2);
    }

    #[tokio::test]
    async fn test_notify_reports_failed_deliveries() {
        let pool = create_test_pool().await;
        let sender = Arc::new(RecordingSender::failing_for(&["+18085555678"]));
        let svc = service(&pool, sender.clone());
        svc.draw(draw_request("4242", "T-shirt"), Utc::now()).await.unwrap();

        let ok = submit(&pool, "+18085551234", "4242").await;
        let bad = submit(&pool, "+18085555678", "4242").await;

        let result = svc.notify_winner("4242", Utc::now()).await.unwrap();
        assert_eq!(result.notified_count, 1);
        assert_eq!(result.failed, vec!["+18085555678".to_string()]);

        let ok_row = submissions::Entity::find_by_id(ok).one(&pool).await.unwrap().unwrap();
        let bad_row = submissions::Entity::find_by_id(bad).one(&pool).await.unwrap().unwrap();
        assert_eq!(ok_row.admin_notification_count, 1);
        assert_eq!(bad_row.admin_notification_count, 0);
    }

    #[tokio::test]
    async fn test_notify_entry_uses_stored_number_under_narrower_policy() {
        let pool = create_test_pool().await;
        let now = Utc::now();
        let entry = winning_entries::ActiveModel {
            raffle_number: Set("12345".to_string()),
            item: Set("T-shirt".to_string()),
            raffle_time: Set(None),
            is_claimed: Set(false),
            system_notification_count: Set(0),
            admin_notification_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();
        submit(&pool, "+18085551234", "12345").await;

        let sender = Arc::new(RecordingSender::default());
        let svc = WinnerService::new(
            pool.clone(),
            RaffleNumberPolicy::new(r"^[0-9]{1,4}$").unwrap(),
            DrawingWindow::default(),
            sender.clone(),
            "WINNER! WINNER! CHICKEN DINNER!".to_string(),
        );

        let result = svc.notify_entry(entry.id, Utc::now()).await.unwrap();
        assert_eq!(result.raffle_number, "12345");
        assert_eq!(result.notified_count, 1);
        assert_eq!(sender.sent().len(), 1);

        // 按号码通知仍然走当前规则
        assert!(matches!(
            svc.notify_winner("12345", Utc::now()).await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_notify_unknown_number() {
        let pool = create_test_pool().await;
        let svc = service(&pool, Arc::new(RecordingSender::default()));
        assert!(matches!(
            svc.notify_winner("4242", Utc::now()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}

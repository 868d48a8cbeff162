use crate::entities::{
    AuditCategory, submission_entity as submissions, submitter_entity as submitters,
    winning_entry_entity as winning_entries,
};
use crate::error::{AppError, AppResult};
use crate::models::SubmissionOutcome;
use crate::services::{is_unique_violation, record_audit};
use crate::utils::{RaffleNumberPolicy, normalize_sender_id};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, QueryFilter, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct SubmissionService {
    pool: DatabaseConnection,
    policy: RaffleNumberPolicy,
}

impl SubmissionService {
    pub fn new(pool: DatabaseConnection, policy: RaffleNumberPolicy) -> Self {
        Self { pool, policy }
    }

    /// Reconcile one inbound text message.
    ///
    /// 1. Body must be a raffle number, otherwise nothing is written
    /// 2. Find or create the submitter for the trimmed sender id
    /// 3. A repeat of (submitter, raffle number) short-circuits with no writes
    /// 4. Otherwise record the submission and look the number up among winners
    /// 5. On a win bump the system notification counters
    ///
    /// Steps 2-5 share one transaction; an error rolls it back and nothing persists.
    /// The caller is responsible for checking the request signature first.
    pub async fn handle_submission(
        &self,
        sender_id: Option<&str>,
        raw_body: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<SubmissionOutcome> {
        let Some(raffle_number) = raw_body.and_then(|body| self.policy.parse(body)) else {
            log::info!("Invalid raffle submission body: {raw_body:?}");
            return Ok(SubmissionOutcome::InvalidNumber);
        };

        let Some(phone_number) = sender_id.and_then(normalize_sender_id) else {
            log::warn!(
                "Raffle submission {raffle_number} arrived without a usable sender id ({sender_id:?}), ignoring"
            );
            return Ok(SubmissionOutcome::MissingSender);
        };

        // 并发首次提交时，另一事务可能先建好 submitter，此时重走一次已有 submitter 分支
        for _ in 0..2 {
            if let Some(outcome) = self.reconcile(&phone_number, &raffle_number, now).await? {
                log::info!("Raffle submission from {phone_number}: {outcome:?}");
                return Ok(outcome);
            }
            log::info!("Submitter {phone_number} was created concurrently, retrying");
        }
        Err(AppError::InternalError(format!(
            "Submitter {phone_number} could be neither found nor created"
        )))
    }

    /// One transactional pass over steps 2-5. `None` means the submitter was
    /// missing on lookup but its insert hit the unique index; nothing was written.
    async fn reconcile(
        &self,
        phone_number: &str,
        raffle_number: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<SubmissionOutcome>> {
        let raffle_number = raffle_number.to_string();
        let txn = self.pool.begin().await?;

        let existing = submitters::Entity::find()
            .filter(submitters::Column::PhoneNumber.eq(phone_number))
            .one(&txn)
            .await?;

        let submitter = match existing {
            Some(submitter) => {
                let duplicate = submissions::Entity::find()
                    .filter(submissions::Column::RaffleNumber.eq(raffle_number.as_str()))
                    .filter(submissions::Column::SubmitterId.eq(submitter.id))
                    .one(&txn)
                    .await?;
                if duplicate.is_some()
                    || !insert_submission(&txn, submitter.id, &raffle_number, now).await?
                {
                    log::info!("{phone_number} already submitted raffle number {raffle_number}");
                    txn.rollback().await?;
                    return Ok(Some(SubmissionOutcome::AlreadySubmitted { raffle_number }));
                }

                let mut am = submitter.clone().into_active_model();
                am.updated_at = Set(now);
                am.update(&txn).await?;

                record_audit(
                    &txn,
                    AuditCategory::Submission,
                    format!(
                        "Existing submitter {phone_number} submitted raffle number {raffle_number}"
                    ),
                    now,
                )
                .await?;
                submitter
            }
            None => {
                let Some(submitter) = insert_submitter(&txn, phone_number, now).await? else {
                    txn.rollback().await?;
                    return Ok(None);
                };

                if !insert_submission(&txn, submitter.id, &raffle_number, now).await? {
                    txn.rollback().await?;
                    return Ok(Some(SubmissionOutcome::AlreadySubmitted { raffle_number }));
                }

                record_audit(
                    &txn,
                    AuditCategory::Submission,
                    format!("New submitter {phone_number} submitted raffle number {raffle_number}"),
                    now,
                )
                .await?;
                submitter
            }
        };

        let winner = winning_entries::Entity::find()
            .filter(winning_entries::Column::RaffleNumber.eq(raffle_number.as_str()))
            .one(&txn)
            .await?;

        let outcome = match winner {
            Some(entry) => {
                winning_entries::Entity::update_many()
                    .col_expr(
                        winning_entries::Column::SystemNotificationCount,
                        Expr::col(winning_entries::Column::SystemNotificationCount).add(1),
                    )
                    .col_expr(winning_entries::Column::UpdatedAt, Expr::value(now))
                    .filter(winning_entries::Column::Id.eq(entry.id))
                    .exec(&txn)
                    .await?;

                bump_submission_system_count(&txn, submitter.id, &raffle_number, now).await?;

                record_audit(
                    &txn,
                    AuditCategory::SystemNotification,
                    format!(
                        "Winner reply sent to {phone_number} for raffle number {raffle_number} (prize: {})",
                        entry.item
                    ),
                    now,
                )
                .await?;

                SubmissionOutcome::Winner {
                    raffle_number,
                    submitter_id: submitter.id,
                    winning_entry_id: entry.id,
                }
            }
            None => SubmissionOutcome::NotWinner {
                raffle_number,
                submitter_id: submitter.id,
            },
        };

        txn.commit().await?;
        Ok(Some(outcome))
    }
}

/// Insert a new submitter. Returns `None` when the phone number already
/// exists, i.e. another transaction created it after our lookup.
async fn insert_submitter(
    txn: &DatabaseTransaction,
    phone_number: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<submitters::Model>> {
    let result = submitters::ActiveModel {
        phone_number: Set(phone_number.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await;

    match result {
        Ok(submitter) => Ok(Some(submitter)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert the (submitter, raffle number) row. Returns `false` when the
/// unique index reports that the pair already exists.
async fn insert_submission(
    txn: &DatabaseTransaction,
    submitter_id: i32,
    raffle_number: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let result = submissions::ActiveModel {
        submitter_id: Set(submitter_id),
        raffle_number: Set(raffle_number.to_string()),
        system_notification_count: Set(0),
        admin_notification_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Increment the system counter on the single submission row for this pair.
/// Zero or several matching rows are logged and skipped without failing.
async fn bump_submission_system_count(
    txn: &DatabaseTransaction,
    submitter_id: i32,
    raffle_number: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let rows = submissions::Entity::find()
        .filter(submissions::Column::RaffleNumber.eq(raffle_number))
        .filter(submissions::Column::SubmitterId.eq(submitter_id))
        .all(txn)
        .await?;

    match rows.as_slice() {
        [row] => {
            submissions::Entity::update_many()
                .col_expr(
                    submissions::Column::SystemNotificationCount,
                    Expr::col(submissions::Column::SystemNotificationCount).add(1),
                )
                .col_expr(submissions::Column::UpdatedAt, Expr::value(now))
                .filter(submissions::Column::Id.eq(row.id))
                .exec(txn)
                .await?;
        }
        [] => {
            log::warn!(
                "No submission row for submitter {submitter_id} and raffle number {raffle_number}, skipping counter"
            );
        }
        many => {
            log::error!(
                "Data integrity anomaly: {} submission rows for submitter {submitter_id} and raffle number {raffle_number}, skipping counter",
                many.len()
            );
        }
    }
    Ok(())
}

use sea_orm_migration::prelude::*;

/// Phone numbers that have texted in at least once
#[derive(DeriveIden)]
enum Submitters {
    Table,
    Id,
    PhoneNumber,
    CreatedAt,
    UpdatedAt,
}

/// One row per (submitter, raffle number) pairing
#[derive(DeriveIden)]
enum Submissions {
    Table,
    Id,
    SubmitterId,
    RaffleNumber,
    SystemNotificationCount,
    AdminNotificationCount,
    CreatedAt,
    UpdatedAt,
}

/// Drawn raffle numbers
#[derive(DeriveIden)]
enum WinningEntries {
    Table,
    Id,
    RaffleNumber,
    Item,
    RaffleTime,
    IsClaimed,
    SystemNotificationCount,
    AdminNotificationCount,
    CreatedAt,
    UpdatedAt,
}

/// Append-only event log
#[derive(DeriveIden)]
enum AuditRecords {
    Table,
    Id,
    Category,
    Message,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Uniqueness is enforced here rather than only in application code:
/// - submitters.phone_number
/// - submissions (raffle_number, submitter_id)
/// - winning_entries.raffle_number
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Submitters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submitters::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Submitters::PhoneNumber)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submitters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Submitters::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_submitters_phone_number_unique")
                    .table(Submitters::Table)
                    .col(Submitters::PhoneNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Submissions::SubmitterId).integer().not_null())
                    .col(
                        ColumnDef::new(Submissions::RaffleNumber)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::SystemNotificationCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Submissions::AdminNotificationCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Submissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Submissions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_submitter")
                            .from(Submissions::Table, Submissions::SubmitterId)
                            .to(Submitters::Table, Submitters::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一号码不能重复提交同一个抽奖号
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_submissions_raffle_submitter_unique")
                    .table(Submissions::Table)
                    .col(Submissions::RaffleNumber)
                    .col(Submissions::SubmitterId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_submissions_submitter")
                    .table(Submissions::Table)
                    .col(Submissions::SubmitterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WinningEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WinningEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::RaffleNumber)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::Item)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::RaffleTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::IsClaimed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::SystemNotificationCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::AdminNotificationCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WinningEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_winning_entries_raffle_number_unique")
                    .table(WinningEntries::Table)
                    .col(WinningEntries::RaffleNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuditRecords::Category)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditRecords::Message).text().not_null())
                    .col(
                        ColumnDef::new(AuditRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：审计 -> 中奖 -> 提交 -> 号码
        manager
            .drop_table(Table::drop().if_exists().table(AuditRecords::Table).to_owned())
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(WinningEntries::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Submissions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Submitters::Table).to_owned())
            .await?;

        Ok(())
    }
}

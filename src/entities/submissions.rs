use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One (submitter, raffle number) pairing.
/// - (raffle_number, submitter_id) is unique at the database level
/// - both notification counters only ever grow
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub submitter_id: i32,
    pub raffle_number: String,
    /// Winner replies sent automatically at submission time
    pub system_notification_count: i32,
    /// Winner messages triggered by staff
    pub admin_notification_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::submitters::Entity",
        from = "Column::SubmitterId",
        to = "super::submitters::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Submitter,
}

impl Related<super::submitters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

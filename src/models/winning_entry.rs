use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::winning_entry_entity as winning_entries;
use crate::error::{AppError, AppResult};

/// Admin response for a drawn raffle number
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WinningEntryResponse {
    pub id: i32,
    #[schema(example = "4242")]
    pub raffle_number: String,
    #[schema(example = "T-shirt")]
    pub item: String,
    pub raffle_time: Option<DateTime<Utc>>,
    pub is_claimed: bool,
    pub system_notification_count: i32,
    pub admin_notification_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<winning_entries::Model> for WinningEntryResponse {
    fn from(m: winning_entries::Model) -> Self {
        WinningEntryResponse {
            id: m.id,
            raffle_number: m.raffle_number,
            item: m.item,
            raffle_time: m.raffle_time,
            is_claimed: m.is_claimed,
            system_notification_count: m.system_notification_count,
            admin_notification_count: m.admin_notification_count,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Public view of a winning number (no counters)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicWinnerResponse {
    pub raffle_number: String,
    pub item: String,
    pub raffle_time: Option<DateTime<Utc>>,
}

impl From<winning_entries::Model> for PublicWinnerResponse {
    fn from(m: winning_entries::Model) -> Self {
        PublicWinnerResponse {
            raffle_number: m.raffle_number,
            item: m.item,
            raffle_time: m.raffle_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WinnerBoardResponse {
    pub unclaimed: Vec<PublicWinnerResponse>,
    pub claimed: Vec<PublicWinnerResponse>,
}

/// Draw a winning number
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateWinningEntryRequest {
    #[schema(example = "4242")]
    pub raffle_number: String,
    #[schema(example = "T-shirt")]
    pub item: String,
    pub raffle_time: Option<DateTime<Utc>>,
}

/// Edit a winning number; omitted fields stay unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateWinningEntryRequest {
    pub raffle_number: Option<String>,
    pub item: Option<String>,
    pub raffle_time: Option<DateTime<Utc>>,
    pub is_claimed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WinningEntryQuery {
    /// true = 已领取, false = 未领取, 不传 = 全部
    pub claimed: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Inclusive window in which drawings may be scheduled
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawingWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DrawingWindow {
    pub fn check(&self, raffle_time: Option<DateTime<Utc>>) -> AppResult<()> {
        let Some(time) = raffle_time else {
            return Ok(());
        };
        if let Some(start) = self.start
            && time < start
        {
            return Err(AppError::ValidationError(format!(
                "Drawing time must not be before {start}"
            )));
        }
        if let Some(end) = self.end
            && time > end
        {
            return Err(AppError::ValidationError(format!(
                "Drawing time must not be after {end}"
            )));
        }
        Ok(())
    }
}

/// Prize descriptions are required and capped at the column width.
pub fn validate_item(item: &str) -> AppResult<String> {
    let item = item.trim();
    if item.is_empty() {
        return Err(AppError::ValidationError("Prize is required".to_string()));
    }
    if item.chars().count() > 256 {
        return Err(AppError::ValidationError(
            "Prize must be at most 256 characters".to_string(),
        ));
    }
    Ok(item.to_string())
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of an admin-triggered winner notification
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotifyWinnerResponse {
    pub raffle_number: String,
    /// Submitters that received the message
    pub notified_count: usize,
    /// Phone numbers the message could not be delivered to
    pub failed: Vec<String>,
    /// Set when nothing was sent, e.g. nobody submitted the number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

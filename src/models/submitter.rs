use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{submission_entity as submissions, submitter_entity as submitters};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: i32,
    pub submitter_id: i32,
    pub raffle_number: String,
    pub system_notification_count: i32,
    pub admin_notification_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<submissions::Model> for SubmissionResponse {
    fn from(m: submissions::Model) -> Self {
        SubmissionResponse {
            id: m.id,
            submitter_id: m.submitter_id,
            raffle_number: m.raffle_number,
            system_notification_count: m.system_notification_count,
            admin_notification_count: m.admin_notification_count,
            created_at: m.created_at,
        }
    }
}

/// A phone number together with every raffle number it has submitted
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitterResponse {
    pub id: i32,
    #[schema(example = "+18085551234")]
    pub phone_number: String,
    pub submissions: Vec<SubmissionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmitterResponse {
    pub fn new(submitter: submitters::Model, submissions: Vec<submissions::Model>) -> Self {
        SubmitterResponse {
            id: submitter.id,
            phone_number: submitter.phone_number,
            submissions: submissions.into_iter().map(Into::into).collect(),
            created_at: submitter.created_at,
            updated_at: submitter.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSubmitterRequest {
    #[schema(example = "+18085551234")]
    pub phone_number: String,
    #[serde(default)]
    pub raffle_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubmitterRequest {
    #[schema(example = "+18085555678")]
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddSubmissionRequest {
    #[schema(example = "4242")]
    pub raffle_number: String,
}

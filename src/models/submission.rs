use crate::config::RaffleConfig;
use serde::Serialize;

/// Result of reconciling one inbound text against stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Body was not a raffle number; nothing was written
    InvalidNumber,
    /// No sender id on the event; nothing was written
    MissingSender,
    /// Sender already submitted this number; nothing was written
    AlreadySubmitted { raffle_number: String },
    Winner {
        raffle_number: String,
        submitter_id: i32,
        winning_entry_id: i32,
    },
    NotWinner {
        raffle_number: String,
        submitter_id: i32,
    },
}

impl SubmissionOutcome {
    /// Text to send back to the sender, `None` when no reply should go out.
    pub fn reply_text<'a>(&self, copy: &'a RaffleConfig) -> Option<&'a str> {
        match self {
            SubmissionOutcome::InvalidNumber => Some(&copy.invalid_number_copy),
            SubmissionOutcome::MissingSender => None,
            SubmissionOutcome::AlreadySubmitted { .. } => Some(&copy.already_submitted_copy),
            SubmissionOutcome::Winner { .. } => Some(&copy.winner_copy),
            SubmissionOutcome::NotWinner { .. } => Some(&copy.loser_copy),
        }
    }
}

use crate::error::{AppError, AppResult};
use regex::Regex;

/// Accepted shape of a raffle number. The pattern comes from configuration
/// because the digit count changes between events.
#[derive(Debug, Clone)]
pub struct RaffleNumberPolicy {
    pattern: Regex,
}

impl RaffleNumberPolicy {
    /// Compile `pattern`. The whole trimmed body must match, so the pattern
    /// is anchored even if the configured value is not.
    pub fn new(pattern: &str) -> AppResult<Self> {
        let anchored = format!("^(?:{pattern})$");
        let pattern = Regex::new(&anchored).map_err(|e| {
            AppError::ConfigError(format!("Invalid raffle number pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { pattern })
    }

    /// Returns the trimmed raffle number, or `None` if the body is not one.
    pub fn parse(&self, raw_body: &str) -> Option<String> {
        let trimmed = raw_body.trim();
        if self.pattern.is_match(trimmed) {
            Some(trimmed.to_string())
        } else {
            None
        }
    }

    /// Same as [`parse`](Self::parse) but as a validation error for admin input.
    pub fn validate(&self, raffle_number: &str) -> AppResult<String> {
        self.parse(raffle_number).ok_or_else(|| {
            AppError::ValidationError(format!("Invalid raffle number: {raffle_number:?}"))
        })
    }
}

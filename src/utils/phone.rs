use crate::error::{AppError, AppResult};

/// 与 `submitters.phone_number` 列宽一致
pub const MAX_PHONE_NUMBER_LEN: usize = 32;

/// Normalize the sender id reported by the SMS provider.
/// Returns `None` when nothing is left after trimming, or when the id is
/// longer than [`MAX_PHONE_NUMBER_LEN`] and could not be stored.
pub fn normalize_sender_id(sender_id: &str) -> Option<String> {
    let trimmed = sender_id.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_PHONE_NUMBER_LEN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Validate a phone number typed in by staff.
pub fn validate_phone_number(phone: &str) -> AppResult<String> {
    let normalized = phone.trim();
    if normalized.is_empty() {
        return Err(AppError::ValidationError(
            "Phone number is required".to_string(),
        ));
    }

    if normalized.len() > MAX_PHONE_NUMBER_LEN {
        return Err(AppError::ValidationError(format!(
            "Phone number must be at most {MAX_PHONE_NUMBER_LEN} characters"
        )));
    }

    let digits = normalized.strip_prefix('+').unwrap_or(normalized);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::ValidationError(
            "Phone number must be digits with an optional leading +".to_string(),
        ));
    }

    Ok(normalized.to_string())
}

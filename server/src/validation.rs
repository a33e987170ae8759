use crate::error::ValidationError;

/// Maximum text length for synthesis requests, in Unicode scalar values.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Validate synthesis text
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ValidationError::TextTooLong);
    }
    Ok(())
}

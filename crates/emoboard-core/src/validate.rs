//! Input validation for new posts.
//!
//! Text is trimmed before it is measured, and length is counted in Unicode
//! scalar values so multi-byte characters count once.

/// Maximum post length after trimming.
pub const MAX_TEXT_CHARS: usize = 100;

/// Reasons a post text is rejected before any backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Text cannot be empty")]
    Empty,
    #[error("Text is too long (maximum {max} characters, got {len})")]
    TooLong { len: usize, max: usize },
}

/// Trim `raw` and check it fits the post length bounds.
///
/// Returns the trimmed text on success.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for blank input and
/// [`ValidationError::TooLong`] for more than [`MAX_TEXT_CHARS`] characters.
pub fn validate_text(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = trimmed.chars().count();
    if len > MAX_TEXT_CHARS {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_TEXT_CHARS,
        });
    }

    Ok(trimmed.to_string())
}

//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted external identity.
pub const MAX_GAP_ID_LEN: usize = 128;
/// Longest accepted display name.
pub const MAX_PLAYER_NAME_LEN: usize = 32;
/// Number of letters in a playground code.
pub const PLAYGROUND_CODE_LEN: usize = 6;

/// Validates an external identity: 1 to 128 characters of `[A-Za-z0-9_-]`.
///
/// ```ignore
/// validate_gap_id("user_42")  // Ok
/// validate_gap_id("")         // Err - empty
/// validate_gap_id("a b")      // Err - space
/// ```
pub fn validate_gap_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_GAP_ID_LEN {
        let mut err = ValidationError::new("gap_id_length");
        err.message = Some(
            format!(
                "gap_id must be between 1 and {MAX_GAP_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("gap_id_format");
        err.message =
            Some("gap_id may only contain letters, digits, underscores and dashes".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a display name: non-blank and at most 32 characters.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("name must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(format!("name must be at most {MAX_PLAYER_NAME_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Whether `code` is six uppercase ASCII letters.
pub fn is_playground_code(code: &str) -> bool {
    code.len() == PLAYGROUND_CODE_LEN && code.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_gap_id_valid() {
        assert!(validate_gap_id("user_42").is_ok());
        assert!(validate_gap_id("A-b_C").is_ok());
        assert!(validate_gap_id(&"x".repeat(MAX_GAP_ID_LEN)).is_ok());
    }

    #[test]
    fn test_validate_gap_id_invalid_length() {
        assert!(validate_gap_id("").is_err());
        assert!(validate_gap_id(&"x".repeat(MAX_GAP_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_gap_id_invalid_format() {
        assert!(validate_gap_id("a b").is_err());
        assert!(validate_gap_id("user@example").is_err());
        assert!(validate_gap_id("émile").is_err());
    }

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("NeonNinja").is_ok());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name(&"n".repeat(MAX_PLAYER_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_playground_code() {
        assert!(is_playground_code("ABCDEF"));
        assert!(!is_playground_code("abcdef"));
        assert!(!is_playground_code("ABCDE"));
        assert!(!is_playground_code("ABCDE1"));
    }
}

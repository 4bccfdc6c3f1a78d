//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest game name accepted at the HTTP boundary.
pub const MAX_GAME_NAME_LEN: usize = 128;

/// Validates that a game name is non-empty, reasonably short and free of control characters.
///
/// Any other string is accepted so that games added later need no server change.
///
/// # Examples
///
/// ```ignore
/// validate_game_name("word_search") // Ok
/// validate_game_name("")            // Err - empty
/// validate_game_name("quiz\ngame")  // Err - control character
/// ```
pub fn validate_game_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("game_name_empty");
        err.message = Some("Game name must not be empty".into());
        return Err(err);
    }

    let len = name.chars().count();
    if len > MAX_GAME_NAME_LEN {
        let mut err = ValidationError::new("game_name_length");
        err.message = Some(
            format!("Game name must be at most {MAX_GAME_NAME_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("game_name_format");
        err.message = Some("Game name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

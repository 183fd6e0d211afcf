use crate::error::{AppError, Result};

/// Maximum username length in characters.
pub const USERNAME_MAX_LEN: usize = 16;
/// Minimum password length in bytes.
pub const PASSWORD_MIN_LEN: usize = 6;

/// Validates a username.
///
/// A username is 1 to 16 word characters: ASCII letters, digits and `_`.
///
/// # Arguments
///
/// * `username` - The username to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the username is valid.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > USERNAME_MAX_LEN {
        return Err(AppError::Validation(
            "Username must be between 1 and 16 characters long".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::Validation(
            "Username can only contain letters, numbers and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    Ok(())
}

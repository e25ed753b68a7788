use super::ValidationError;

pub const MAX_USERNAME_LENGTH: usize = 255;
pub const MAX_MESSAGE_LENGTH: usize = 1000;

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::UsernameEmpty);
    }

    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::UsernameWhitespace);
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooLong);
    }

    Ok(())
}

pub fn validate_join_message(message: &str) -> Result<(), ValidationError> {
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(())
}

use super::ValidationError;

pub const MAX_TEAM_NAME_LENGTH: usize = 255;

/// Validates a team name and returns it trimmed.
pub fn validate_team_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::TeamNameEmpty);
    }

    if trimmed.chars().count() > MAX_TEAM_NAME_LENGTH {
        return Err(ValidationError::TeamNameTooLong);
    }

    Ok(trimmed)
}

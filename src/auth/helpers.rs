use super::{TokenGenerator, parse_token};
use crate::identity::Directory;

#[derive(Debug, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    InternalError,
}

/// Extracts the bearer token from an Authorization header.
/// Returns None if no header is present.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    match auth_header {
        Some(header) => header
            .strip_prefix("Bearer ")
            .map(|t| Some(t.trim().to_string()))
            .ok_or(TokenValidationError::InvalidScheme),
        None => Ok(None),
    }
}

/// Checks a raw token against the directory and returns its user id.
pub fn validate_token(
    directory: &Directory,
    raw_token: &str,
) -> Result<String, TokenValidationError> {
    let (lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let credential = directory
        .credential_by_lookup(&lookup)
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(raw_token, &credential.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    Ok(credential.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_token_from_header(None), Ok(None));
        assert_eq!(
            extract_token_from_header(Some("Bearer abc")),
            Ok(Some("abc".to_string()))
        );
        assert_eq!(
            extract_token_from_header(Some("Basic abc")),
            Err(TokenValidationError::InvalidScheme)
        );
    }

    #[test]
    fn test_validate_against_directory() {
        let directory = Directory::new();
        directory.insert_user("mia", "Mia", Role::User);
        let issued = TokenGenerator::new().issue("mia").unwrap();
        directory.insert_credential(issued.credential.clone());

        assert_eq!(validate_token(&directory, &issued.raw), Ok("mia".to_string()));

        let forged = format!("redline_{}_{}", issued.credential.token_lookup, "0".repeat(24));
        assert_eq!(
            validate_token(&directory, &forged),
            Err(TokenValidationError::InvalidToken)
        );
        assert_eq!(
            validate_token(&directory, "nonsense"),
            Err(TokenValidationError::InvalidToken)
        );
    }
}

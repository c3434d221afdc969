/// Header carrying the API key on every protected request.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the key configured at startup.
///
/// When no key is configured every request is accepted.
///
/// # Errors
///
/// Returns [`ApiKeyError::Missing`] if a key is configured but none was sent, and
/// [`ApiKeyError::Invalid`] if the sent key does not match.
pub fn validate_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), ApiKeyError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match provided {
        None => Err(ApiKeyError::Missing),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(ApiKeyError::Invalid),
    }
}

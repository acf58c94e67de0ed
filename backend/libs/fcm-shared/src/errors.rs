use thiserror::Error;

/// FCM Client Error Types
#[derive(Error, Debug)]
pub enum FCMError {
    #[error("Failed to parse private key: {0}")]
    KeyParseError(String),

    #[error("Failed to encode JWT: {0}")]
    JwtEncodeError(String),

    #[error("Failed to get access token: {0}")]
    TokenError(String),

    #[error("Token request failed with status: {0}")]
    TokenRequestFailed(String),

    #[error("Failed to parse token response: {0}")]
    TokenParseError(String),

    #[error("FCM send request failed: {0}")]
    SendRequestError(String),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParseError(String),

    #[error("FCM API error: {0} - {1}")]
    ApiError(u16, String),

    #[error("Invalid device token")]
    InvalidToken,
}

impl FCMError {
    /// True when FCM rejected the token itself (unregistered or malformed).
    ///
    /// The caller cannot fix these by resending; the device has to register again.
    pub fn is_unregistered_token(&self) -> bool {
        match self {
            FCMError::InvalidToken => true,
            FCMError::ApiError(status, body) => {
                let lower = body.to_lowercase();
                *status == 404
                    || lower.contains("unregistered")
                    || (lower.contains("invalid") && lower.contains("registration"))
            }
            _ => false,
        }
    }
}

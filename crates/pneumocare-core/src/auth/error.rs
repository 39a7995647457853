use thiserror::Error;

use super::codec::DecodeError;
use crate::api::ApiError;

/// Failures surfaced by session operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend rejected the exchange, or it never completed
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] ApiError),

    #[error("Token response is missing the {0} token")]
    MissingTokens(&'static str),

    #[error("Issued access token could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    #[error("Token storage failed: {0:#}")]
    Storage(anyhow::Error),

    #[error("Registration failed: {0}")]
    Registration(String),
}

impl AuthError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Exchange(e) => format!("Login failed! {}", e.user_message()),
            AuthError::MissingTokens(_) => "Login failed! Missing tokens.".to_string(),
            AuthError::Decode(_) => "Login failed! The server issued an unreadable token.".to_string(),
            AuthError::Storage(_) => "Login failed! Could not save your session.".to_string(),
            AuthError::Registration(message) => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            AuthError::MissingTokens("refresh").user_message(),
            "Login failed! Missing tokens."
        );
        assert_eq!(
            AuthError::Exchange(ApiError::Unauthorized(String::new())).user_message(),
            "Login failed! Invalid username or password"
        );
        assert_eq!(
            AuthError::Registration("Username taken".to_string()).user_message(),
            "Username taken"
        );
    }

    #[test]
    fn test_storage_error_display_includes_context() {
        let err = AuthError::Storage(
            anyhow::anyhow!("disk full").context("Failed to replace token file"),
        );
        let text = err.to_string();
        assert!(text.contains("Failed to replace token file"));
        assert!(text.contains("disk full"));
    }
}

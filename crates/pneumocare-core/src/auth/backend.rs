use async_trait::async_trait;

use crate::api::ApiError;
use crate::models::TokenResponse;

/// Token-issuing side of the backend, as seen by the session manager.
///
/// Implemented by [`crate::api::ApiClient`] over HTTP. Implementations report
/// non-success statuses and transport failures as `ApiError` and never retry.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange a username and password for an access/refresh pair
    async fn obtain_pair(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError>;

    /// Exchange a refresh token for a new access token
    async fn refresh_access(&self, refresh: &str) -> Result<TokenResponse, ApiError>;

    /// Create a new account
    async fn create_user(&self, username: &str, password: &str) -> Result<(), ApiError>;
}

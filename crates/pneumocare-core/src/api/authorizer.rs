use reqwest::RequestBuilder;

use super::ApiError;
use crate::auth::{SessionHandle, SessionState};

/// What to do with a request when there is no authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Send the request without credentials
    Optional,
    /// Fail locally with `ApiError::NotAuthenticated`
    Required,
}

/// Attaches the session's access token to outbound requests.
///
/// The state is read at attach time, so once the manager has logged out no
/// further request carries the old token.
#[derive(Clone)]
pub struct RequestAuthorizer {
    session: SessionHandle,
}

impl RequestAuthorizer {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn attach(&self, request: RequestBuilder, policy: AuthPolicy) -> Result<RequestBuilder, ApiError> {
        self.session.with(|state| attach(request, state, policy))
    }
}

/// Add the bearer credential for `state` to `request`.
pub fn attach(
    request: RequestBuilder,
    state: &SessionState,
    policy: AuthPolicy,
) -> Result<RequestBuilder, ApiError> {
    match (state.access_token(), policy) {
        (Some(token), _) => Ok(request.bearer_auth(token)),
        (None, AuthPolicy::Optional) => Ok(request),
        (None, AuthPolicy::Required) => Err(ApiError::NotAuthenticated),
    }
}

use serde::{Deserialize, Serialize};

use super::codec::Claims;

/// The access/refresh token pair issued by the backend.
///
/// A pair is only ever replaced as a whole: a successful exchange produces a
/// new value, a failed one discards the pair entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Build the pair that follows a refresh exchange.
    /// Backends that rotate refresh tokens return a new one; otherwise the
    /// current refresh token stays valid and is carried over.
    pub fn renewed(&self, access: String, refresh: Option<String>) -> Self {
        Self {
            access,
            refresh: refresh
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| self.refresh.clone()),
        }
    }
}

/// Current state of the user's session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Hydration from storage has not finished yet
    #[default]
    Initializing,
    Unauthenticated,
    Authenticated {
        credentials: CredentialPair,
        claims: Claims,
    },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }

    /// Get the bearer token if the session is authenticated
    pub fn access_token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { credentials, .. } => Some(credentials.access.as_str()),
            _ => None,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { credentials, .. } if !credentials.refresh.is_empty() => {
                Some(credentials.refresh.as_str())
            }
            _ => None,
        }
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            SessionState::Authenticated { claims, .. } => Some(claims),
            _ => None,
        }
    }

    /// Short label for logs and status output
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated { .. } => "authenticated",
        }
    }
}

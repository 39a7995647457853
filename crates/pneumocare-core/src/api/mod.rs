//! REST API client module for the pneumocare backend.
//!
//! This module provides the `ApiClient` for the token endpoints and the
//! feature endpoints, and the `RequestAuthorizer` that attaches the current
//! session's bearer token to outbound requests.
//!
//! The backend issues JWT access/refresh pairs from `/api/token/`.

pub mod authorizer;
pub mod client;
pub mod error;

pub use authorizer::{AuthPolicy, RequestAuthorizer};
pub use client::ApiClient;
pub use error::ApiError;

//! Core library for pneumocare.
//!
//! Session lifecycle management for the pneumocare client: token acquisition,
//! persistence, decoding, background renewal and expiry-driven logout, plus
//! the access gate and request authorization built on top of it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthPolicy, RequestAuthorizer};
pub use auth::{
    Admission, AuthBackend, AuthError, Claims, CredentialPair, Route, SessionHandle,
    SessionManager, SessionSettings, SessionState, TokenStore,
};
pub use config::Config;

//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `SessionManager`: hydration, login, logout, and background token renewal
//! - `TokenStore`: durable storage of the access/refresh pair (file, keychain, memory)
//! - `codec`: client-side decoding of access token claims
//! - `gate`: admission checks for protected views
//!
//! Tokens are persisted under one fixed key and renewed every few minutes
//! while the session is authenticated.

pub mod backend;
pub mod codec;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod manager;
pub mod session;
pub mod store;

pub use backend::AuthBackend;
pub use codec::{Claims, DecodeError};
pub use credentials::KeyringTokenStore;
pub use error::AuthError;
pub use gate::{Admission, Route};
pub use manager::{Renewal, SessionHandle, SessionManager, SessionSettings};
pub use session::{CredentialPair, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};

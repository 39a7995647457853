//! Wire types for the pneumocare backend.
//!
//! - `TokenResponse`: token obtain/refresh bodies
//! - `Prediction`, `RagAnswer`: feature endpoint results

pub mod prediction;
pub mod token;

pub use prediction::{Prediction, RagAnswer};
pub use token::TokenResponse;
pub(crate) use token::{CredentialsRequest, RefreshRequest};

//! Client-side decoding of access tokens.
//!
//! Tokens are JWTs issued by the backend. The client only reads the payload
//! for identity and expiry bookkeeping; signature verification is the
//! backend's job and is not attempted here.

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identity and expiry decoded from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub username: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub token_type: Option<String>,
    pub jti: Option<String>,
}

impl Claims {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before the access token expires (negative once expired)
    pub fn expires_in(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.expires_in().num_minutes().max(0)
    }

    /// Name to show the user: the username claim when present, else the subject
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.subject)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Token is not a three-part JWT")]
    Malformed,

    #[error("Token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not a JSON claims object: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Token has no subject claim")]
    MissingSubject,

    #[error("Token has no expiry claim")]
    MissingExpiry,

    #[error("Token expiry is out of range")]
    InvalidExpiry,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<Value>,
    user_id: Option<Value>,
    username: Option<String>,
    exp: Option<f64>,
    iat: Option<f64>,
    token_type: Option<String>,
    jti: Option<String>,
}

/// Decode the claims of an access token.
///
/// Never panics. Expired tokens decode successfully; expiry policy belongs to
/// the session manager and the backend.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DecodeError::Malformed);
    };
    if payload.is_empty() {
        return Err(DecodeError::Malformed);
    }

    let bytes = decode_segment(payload)?;
    let raw: RawClaims = serde_json::from_slice(&bytes)?;

    let subject = raw
        .sub
        .as_ref()
        .and_then(claim_as_string)
        .or_else(|| raw.user_id.as_ref().and_then(claim_as_string))
        .or_else(|| raw.username.clone().filter(|u| !u.is_empty()))
        .ok_or(DecodeError::MissingSubject)?;

    let exp = raw.exp.ok_or(DecodeError::MissingExpiry)?;
    let expires_at = timestamp(exp).ok_or(DecodeError::InvalidExpiry)?;

    Ok(Claims {
        subject,
        expires_at,
        username: raw.username,
        issued_at: raw.iat.and_then(timestamp),
        token_type: raw.token_type,
        jti: raw.jti,
    })
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| general_purpose::URL_SAFE.decode(segment))
}

/// Subject-like claims arrive as strings or as integer user ids
fn claim_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.floor() as i64, 0)
}

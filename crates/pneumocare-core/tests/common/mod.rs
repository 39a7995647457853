#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::StatusCode;
use tokio::sync::Notify;

use pneumocare_core::auth::MemoryTokenStore;
use pneumocare_core::models::TokenResponse;
use pneumocare_core::{ApiError, AuthBackend, CredentialPair, TokenStore};

/// Far enough in the future that tokens never look expired in tests
pub const FUTURE_EXP: i64 = 4_102_444_800;

/// Build an unsigned JWT the way the backend's tokens look
pub fn token(user_id: u64, jti: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({
        "token_type": "access",
        "exp": FUTURE_EXP,
        "iat": FUTURE_EXP - 300,
        "jti": jti,
        "user_id": user_id,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig-{}", header, body, jti)
}

/// A scripted reply from the fake backend
#[derive(Clone)]
pub enum Reply {
    Tokens { access: Option<String>, refresh: Option<String> },
    Status(u16, &'static str),
    /// The request never reached the server
    Network,
}

impl Reply {
    pub fn pair(access: &str, refresh: &str) -> Self {
        Reply::Tokens {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
        }
    }

    pub fn access_only(access: &str) -> Self {
        Reply::Tokens {
            access: Some(access.to_string()),
            refresh: None,
        }
    }

    fn into_result(self) -> Result<TokenResponse, ApiError> {
        match self {
            Reply::Tokens { access, refresh } => Ok(TokenResponse { access, refresh }),
            Reply::Status(code, body) => Err(ApiError::from_status(
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body,
            )),
            Reply::Network => Err(ApiError::NetworkError(transport_error())),
        }
    }
}

/// A real `reqwest::Error`, produced without touching the network
fn transport_error() -> reqwest::Error {
    match reqwest::Client::new().get("not a url").build() {
        Ok(_) => panic!("expected an invalid URL to fail"),
        Err(e) => e,
    }
}

/// Holds a refresh exchange open until the test releases it
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct FakeBackend {
    pub login: Mutex<Reply>,
    pub refresh: Mutex<Reply>,
    pub create_user: Mutex<Reply>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub refresh_gate: Option<Gate>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            login: Mutex::new(Reply::pair(&token(1, "login"), "refresh-1")),
            refresh: Mutex::new(Reply::access_only(&token(1, "renewed"))),
            create_user: Mutex::new(Reply::Tokens {
                access: None,
                refresh: None,
            }),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            refresh_gate: Some(Gate::default()),
            ..Self::new()
        }
    }

    pub fn set_login(&self, reply: Reply) {
        *self.login.lock().unwrap() = reply;
    }

    pub fn set_refresh(&self, reply: Reply) {
        *self.refresh.lock().unwrap() = reply;
    }

    pub fn set_create_user(&self, reply: Reply) {
        *self.create_user.lock().unwrap() = reply;
    }

    pub fn gate(&self) -> &Gate {
        self.refresh_gate.as_ref().expect("backend built with FakeBackend::gated")
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn obtain_pair(&self, _username: &str, _password: &str) -> Result<TokenResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.login.lock().unwrap().clone();
        reply.into_result()
    }

    async fn refresh_access(&self, _refresh: &str) -> Result<TokenResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let reply = self.refresh.lock().unwrap().clone();
        reply.into_result()
    }

    async fn create_user(&self, _username: &str, _password: &str) -> Result<(), ApiError> {
        let reply = self.create_user.lock().unwrap().clone();
        reply.into_result().map(|_| ())
    }
}

/// Token store whose writes always fail; reads and clears work
pub struct FailingSaveStore {
    inner: MemoryTokenStore,
}

impl FailingSaveStore {
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            inner: MemoryTokenStore::with_pair(pair),
        }
    }
}

impl TokenStore for FailingSaveStore {
    fn load(&self) -> anyhow::Result<Option<CredentialPair>> {
        self.inner.load()
    }

    fn save(&self, _pair: &CredentialPair) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.inner.clear()
    }
}

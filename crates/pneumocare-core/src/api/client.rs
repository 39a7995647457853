//! API client for communicating with the pneumocare backend.
//!
//! This module provides the `ApiClient` struct for the token endpoints used by
//! the session manager and for the feature endpoints (prediction upload and
//! the RAG chat query) that send the session's bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::authorizer::{AuthPolicy, RequestAuthorizer};
use super::ApiError;
use crate::auth::AuthBackend;
use crate::models::{CredentialsRequest, Prediction, RagAnswer, RefreshRequest, TokenResponse};

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when none is configured (the backend's dev server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// Bounds every exchange; the session manager adds no timeout of its own.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const TOKEN_PATH: &str = "/api/token/";
const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";
const CREATE_USER_PATH: &str = "/api/user/create";
const PREDICT_PATH: &str = "/api/predict/";
const RAG_QUERY_PATH: &str = "/api/rag-query/";

/// API client for the pneumocare backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request and parse its JSON body
    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T, ApiError> {
        let response = Self::check_response(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        debug!(path = path, "POST");
        Self::send_json(self.client.post(self.url(path)).json(body), path).await
    }

    /// Upload an image for classification. Requires an authenticated session.
    pub async fn predict(
        &self,
        authorizer: &RequestAuthorizer,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Prediction, ApiError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let request = authorizer.attach(
            self.client.post(self.url(PREDICT_PATH)).multipart(form),
            AuthPolicy::Required,
        )?;
        debug!(file = file_name, "Uploading image for prediction");
        Self::send_json(request, "prediction").await
    }

    /// Ask the RAG chat endpoint a question. Credentials are sent when available.
    pub async fn rag_query(&self, authorizer: &RequestAuthorizer, query: &str) -> Result<RagAnswer, ApiError> {
        let request = authorizer.attach(
            self.client.get(self.url(RAG_QUERY_PATH)).query(&[("query", query)]),
            AuthPolicy::Optional,
        )?;
        Self::send_json(request, "rag query").await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn obtain_pair(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        self.post_json(TOKEN_PATH, &CredentialsRequest { username, password })
            .await
    }

    async fn refresh_access(&self, refresh: &str) -> Result<TokenResponse, ApiError> {
        self.post_json(TOKEN_REFRESH_PATH, &RefreshRequest { refresh }).await
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<(), ApiError> {
        debug!(path = CREATE_USER_PATH, "POST");
        let request = self
            .client
            .post(self.url(CREATE_USER_PATH))
            .json(&CredentialsRequest { username, password });
        Self::check_response(request.send().await?).await?;
        Ok(())
    }
}

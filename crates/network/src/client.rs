// crates/network/src/client.rs
//! HTTP client wrapper

use crate::error::{NetworkError, NetworkResult};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("laboursync/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            auth_token: None,
        }
    }
}

/// Thin HTTP client
///
/// Retries are not attempted here: the sync engine owns backoff for failed events.
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs a HEAD request
    pub async fn head(&self, url: &str) -> NetworkResult<Response> {
        let request = self.authorize(self.inner.head(url));
        let response = request.send().await.map_err(classify)?;
        check_status(response).await
    }

    /// POSTs a JSON body and returns the decoded JSON response
    ///
    /// An empty body decodes as `Value::Null`.
    pub async fn post_json(&self, url: &str, body: &Value) -> NetworkResult<Value> {
        let request = self.authorize(self.inner.post(url).json(body));
        let response = request.send().await.map_err(classify)?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await.map_err(classify)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    /// Checks if a URL is accessible
    pub async fn is_accessible(&self, url: &str) -> bool {
        self.head(url).await.is_ok()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else if err.is_builder() {
        NetworkError::InvalidUrl(err.to_string())
    } else {
        NetworkError::Http(err)
    }
}

async fn check_status(response: Response) -> NetworkResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        body
    };

    Err(NetworkError::Status {
        status: status.as_u16(),
        message,
    })
}

//! Thin HTTP client for the external compliance and scan API.
//!
//! Every call takes the caller's [`Credential`] explicitly; the client
//! itself holds no session state.

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::auth::Credential;

pub mod resources;
pub mod scans;

pub use resources::ComplianceResource;
pub use scans::{ScanApi, SubmittedScan};

/// Connection timeout for the backend
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout. PDF rendering gets its own, longer budget.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend responses are truncated to this many characters when used as error detail
const MAX_DETAIL_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Backend unreachable: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Backend returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Unexpected backend response: {0}")]
    Decode(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid backend base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// Status and message to relay to the browser as `{detail}`.
    pub fn detail(&self) -> (u16, String) {
        match self {
            ClientError::Status { status, detail } => (*status, detail.clone()),
            ClientError::NotFound => (404, "Not found".to_string()),
            ClientError::Network(_) => (502, "Backend unreachable".to_string()),
            ClientError::Decode(msg) => (502, msg.clone()),
            ClientError::InvalidBaseUrl(_) => (500, "Backend misconfigured".to_string()),
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Backend URL for `segments`, each one percent-encoded on its own.
    ///
    /// Ids come straight from browser paths, so a segment can never add
    /// path levels. Empty and dot segments name nothing on the backend.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(ClientError::NotFound);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        credential: &Credential,
        path: &[&str],
    ) -> Result<RequestBuilder, ClientError> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .bearer_auth(credential.token()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(ClientError::Network)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            detail: extract_detail(status, &body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await.map_err(ClientError::Network)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &[&str],
    ) -> Result<T, ClientError> {
        let response = self
            .send(self.request(Method::GET, credential, path)?)
            .await?;
        Self::decode(response).await
    }

    pub async fn get_json_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        credential: &Credential,
        path: &[&str],
        query: &Q,
    ) -> Result<T, ClientError> {
        let response = self
            .send(self.request(Method::GET, credential, path)?.query(query))
            .await?;
        Self::decode(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .send(self.request(Method::POST, credential, path)?.json(body))
            .await?;
        Self::decode(response).await
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .send(self.request(Method::PATCH, credential, path)?.json(body))
            .await?;
        Self::decode(response).await
    }

    /// PATCH whose response body is not needed.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        credential: &Credential,
        path: &[&str],
        body: &B,
    ) -> Result<(), ClientError> {
        self.send(self.request(Method::PATCH, credential, path)?.json(body))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, credential: &Credential, path: &[&str]) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, credential, path)?)
            .await?;
        Ok(())
    }

    /// POST a JSON body and return the raw response bytes.
    pub async fn post_for_bytes<B: Serialize + ?Sized>(
        &self,
        credential: &Credential,
        path: &[&str],
        body: &B,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let response = self
            .send(
                self.request(Method::POST, credential, path)?
                    .timeout(timeout)
                    .json(body),
            )
            .await?;
        let bytes = response.bytes().await.map_err(ClientError::Network)?;
        Ok(bytes.to_vec())
    }

    /// Unauthenticated reachability probe used by the health check.
    pub async fn ping(&self) -> bool {
        let Ok(url) = self.url(&["health"]) else {
            return false;
        };

        match self
            .http
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Pull a human-readable message out of a backend error body.
///
/// Understands `{"detail": "..."}`, `{"detail": [{"msg": ...}]}` and
/// `{"error": "..."}`; anything else falls back to the raw text.
pub fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return error.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Backend error")
            .to_string();
    }

    trimmed.chars().take(MAX_DETAIL_CHARS).collect()
}

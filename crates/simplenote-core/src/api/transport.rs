//! The outbound HTTP pipeline.
//!
//! Every call the client makes is described as an `ApiRequest` and handed to a
//! `Transport`. `HttpTransport` is the real implementation on top of reqwest;
//! tests substitute scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// A single outgoing API call, relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// Status and raw body of a completed call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Turn a non-2xx response into the matching `ApiError`
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    /// Decode the body. Empty or malformed bodies are invalid responses.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.trim().is_empty() {
            return Err(ApiError::InvalidResponse("Empty response".to_string()));
        }
        serde_json::from_str(&self.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::network)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ApiError::network)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiError::network)?;
        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Request completed");
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.send_once(request).await?;
            if response.status != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            // Rate limited
            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path = %request.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new("http://localhost:8000/api/").expect("transport");
        assert_eq!(transport.url("auth/token/"), "http://localhost:8000/api/auth/token/");
        assert_eq!(transport.url("/notes/3/"), "http://localhost:8000/api/notes/3/");

        let transport = HttpTransport::new("http://localhost:8000/api").expect("transport");
        assert_eq!(transport.url("notes/"), "http://localhost:8000/api/notes/");
    }

    #[test]
    fn test_json_rejects_empty_and_malformed_bodies() {
        let empty = ApiResponse::new(StatusCode::OK, "  ");
        assert!(matches!(
            empty.json::<serde_json::Value>(),
            Err(ApiError::InvalidResponse(_))
        ));

        let malformed = ApiResponse::new(StatusCode::OK, "{\"access\":");
        assert!(matches!(
            malformed.json::<serde_json::Value>(),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_for_status() {
        let ok = ApiResponse::new(StatusCode::CREATED, "{}");
        assert!(ok.error_for_status().is_ok());

        let conflict = ApiResponse::new(StatusCode::CONFLICT, "taken");
        assert!(matches!(conflict.error_for_status(), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::get("notes/")
            .query("page", 2)
            .query("page_size", 20)
            .bearer("A1");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query, vec![
            ("page".to_string(), "2".to_string()),
            ("page_size".to_string(), "20".to_string()),
        ]);
        assert_eq!(req.bearer.as_deref(), Some("A1"));
        assert!(req.body.is_none());
    }
}

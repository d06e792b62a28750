//! Scripted transport for network-free tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

pub struct FakeTransport {
    handler: Box<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Like `new`, but every response takes `delay` to arrive
    pub fn slow(
        delay: Duration,
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(request)
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(
        StatusCode::from_u16(status).expect("valid status"),
        body.to_string(),
    ))
}

pub fn status_response(status: u16) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(
        StatusCode::from_u16(status).expect("valid status"),
        "",
    ))
}

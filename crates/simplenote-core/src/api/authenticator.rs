use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::{SessionAuthority, TokenStore};

/// Wraps every authenticated API call.
///
/// Attaches the current access token and, when the server answers 401 to a
/// request that carried one, refreshes the session and replays the request
/// exactly once. Token issuance calls (login, register, refresh) must not go
/// through here; `AuthApi` sends them on the bare transport.
#[derive(Clone)]
pub struct RequestAuthenticator {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    authority: SessionAuthority,
}

impl RequestAuthenticator {
    pub fn new(transport: Arc<dyn Transport>, store: TokenStore, authority: SessionAuthority) -> Self {
        Self {
            transport,
            store,
            authority,
        }
    }

    /// Send `request`, returning whatever response the server gave.
    ///
    /// A 401 is only retried when a token was attached and a replacement
    /// token could be obtained; otherwise the original 401 comes back as-is.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let attached = self.store.access_token();
        let mut first = request.clone();
        first.bearer = attached.clone();

        let response = self.transport.send(&first).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }
        let Some(rejected) = attached else {
            debug!(path = %request.path, "Anonymous request unauthorized, not retrying");
            return Ok(response);
        };

        // Another caller may already have replaced the rejected token.
        let current = self.store.access_token();
        let replacement = match current {
            Some(token) if token != rejected => Some(token),
            _ => {
                debug!(path = %request.path, "Request unauthorized, refreshing session");
                if self.authority.refresh().await {
                    self.store.access_token()
                } else {
                    None
                }
            }
        };

        let Some(token) = replacement else {
            warn!(path = %request.path, "Session refresh failed, returning original 401");
            return Ok(response);
        };

        debug!(path = %request.path, "Retrying request with refreshed token");
        self.transport.send(&request.bearer(token)).await
    }

    /// Send `request` and decode a successful JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.error_for_status()?.json()
    }

    /// Send `request`, discarding a successful body
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AuthApi;
    use crate::testing::{json_response, status_response, FakeTransport};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REFRESH: &str = "auth/token/refresh/";

    fn wire(transport: Arc<FakeTransport>, store: &TokenStore) -> RequestAuthenticator {
        let authority = SessionAuthority::new(store.clone(), AuthApi::new(transport.clone()));
        RequestAuthenticator::new(transport, store.clone(), authority)
    }

    fn expired_session(store: &TokenStore) {
        let mut data = crate::auth::SessionData::issued("A1", "R1", 0, Utc::now()).expect("issued");
        data.expires_at = Some(Utc::now() - Duration::seconds(1));
        store.replace(data).expect("seed session");
    }

    #[tokio::test]
    async fn test_attaches_current_token() {
        let transport = FakeTransport::new(|_| json_response(200, json!([])));
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport.clone(), &store);

        let response = auth.execute(ApiRequest::get("notes/")).await.expect("execute");
        assert!(response.is_success());
        assert_eq!(transport.requests()[0].bearer.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_refreshes_and_retries_once() {
        let transport = FakeTransport::new(|req| match (req.path.as_str(), req.bearer.as_deref()) {
            (REFRESH, _) => json_response(200, json!({"access": "A2"})),
            ("notes/", Some("A2")) => json_response(200, json!({"ok": true})),
            _ => status_response(401),
        });
        let store = TokenStore::in_memory();
        expired_session(&store);
        let auth = wire(transport.clone(), &store);

        let response = auth.execute(ApiRequest::get("notes/")).await.expect("execute");
        assert!(response.is_success());

        let data = store.read();
        assert_eq!(data.access_token.as_deref(), Some("A2"));
        assert_eq!(data.refresh_token.as_deref(), Some("R1"));
        let expected = Utc::now() + Duration::seconds(3600);
        assert!((expected - data.expires_at.expect("expiry")).num_seconds().abs() <= 2);

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].bearer.as_deref(), Some("A1"));
        assert_eq!(sent[1].path, REFRESH);
        assert_eq!(sent[2].bearer.as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn test_never_retries_more_than_once() {
        let transport = FakeTransport::new(|req| match req.path.as_str() {
            REFRESH => json_response(200, json!({"access": "A2"})),
            _ => status_response(401),
        });
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport.clone(), &store);

        let response = auth.execute(ApiRequest::get("notes/")).await.expect("execute");
        assert!(response.is_unauthorized());
        assert_eq!(transport.calls_to("notes/"), 2);
        assert_eq!(transport.calls_to(REFRESH), 1);
    }

    #[tokio::test]
    async fn test_anonymous_401_is_not_retried() {
        let transport = FakeTransport::new(|_| status_response(401));
        let store = TokenStore::in_memory();
        let auth = wire(transport.clone(), &store);

        let response = auth.execute(ApiRequest::get("notes/")).await.expect("execute");
        assert!(response.is_unauthorized());
        assert_eq!(transport.total_calls(), 1);
        assert!(transport.requests()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let transport = FakeTransport::new(|req| match req.path.as_str() {
            REFRESH => status_response(401),
            _ => Ok(ApiResponse::new(reqwest::StatusCode::UNAUTHORIZED, "token expired")),
        });
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport.clone(), &store);

        let response = auth.execute(ApiRequest::get("notes/")).await.expect("execute");
        assert!(response.is_unauthorized());
        assert_eq!(response.body, "token expired");
        assert_eq!(transport.calls_to("notes/"), 1);
        assert_eq!(store.access_token().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_retry_result_is_final_even_on_error() {
        let transport = FakeTransport::new(|req| match (req.path.as_str(), req.bearer.as_deref()) {
            (REFRESH, _) => json_response(200, json!({"access": "A2"})),
            (_, Some("A2")) => status_response(500),
            _ => status_response(401),
        });
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport.clone(), &store);

        let err = auth
            .send_json::<serde_json::Value>(ApiRequest::get("notes/"))
            .await
            .expect_err("server error");
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(transport.calls_to("notes/"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&refreshes);
        let transport = FakeTransport::slow(std::time::Duration::from_millis(20), move |req| {
            match (req.path.as_str(), req.bearer.as_deref()) {
                (REFRESH, _) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    json_response(200, json!({"access": "A2"}))
                }
                (_, Some("A2")) => json_response(200, json!({})),
                _ => status_response(401),
            }
        });
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport.clone(), &store);

        let (a, b, c) = tokio::join!(
            auth.execute(ApiRequest::get("notes/")),
            auth.execute(ApiRequest::get("notes/1/")),
            auth.execute(ApiRequest::get("notes/2/")),
        );
        assert!(a.expect("a").is_success());
        assert!(b.expect("b").is_success());
        assert!(c.expect("c").is_success());
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_error_is_surfaced() {
        let transport = FakeTransport::new(|_| Err(ApiError::network("connection refused")));
        let store = TokenStore::in_memory();
        store.write("A1", "R1", 3600).expect("seed");
        let auth = wire(transport, &store);

        let err = auth.execute(ApiRequest::get("notes/")).await.expect_err("network");
        assert!(err.is_network());
        assert_eq!(store.access_token().as_deref(), Some("A1"));
    }
}

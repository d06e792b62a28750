//! Typed wrappers for the `auth/` endpoints.

use std::sync::Arc;

use tracing::debug;

use super::{ApiError, ApiRequest, RequestAuthenticator, Transport};
use crate::models::{
    ChangePasswordRequest, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
    TokenRefreshResponse, TokenResponse, User,
};

const LOGIN_PATH: &str = "auth/token/";
const REFRESH_PATH: &str = "auth/token/refresh/";
const REGISTER_PATH: &str = "auth/register/";
const USER_INFO_PATH: &str = "auth/userinfo/";
const CHANGE_PASSWORD_PATH: &str = "auth/change-password/";

/// Token issuance endpoints.
///
/// These go straight to the transport: they never carry a bearer token and
/// never trigger a refresh themselves.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Exchange credentials for an access/refresh token pair
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let response = self.transport.send(&request).await?.error_for_status()?;
        let tokens: TokenResponse = response.json()?;
        if tokens.access.is_empty() || tokens.refresh.is_empty() {
            return Err(ApiError::InvalidResponse("Empty response".to_string()));
        }
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH).json(&RefreshTokenRequest {
            refresh: refresh_token.to_string(),
        })?;
        let response = self.transport.send(&request).await?.error_for_status()?;
        let refreshed: TokenRefreshResponse = response.json()?;
        if refreshed.access.is_empty() {
            return Err(ApiError::InvalidResponse("Empty access token".to_string()));
        }
        Ok(refreshed.access)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).json(request)?;
        self.transport.send(&request).await?.error_for_status()?;
        debug!("Registration accepted");
        Ok(())
    }
}

/// Account endpoints that require a signed-in user.
#[derive(Clone)]
pub struct AccountApi {
    authenticator: RequestAuthenticator,
}

impl AccountApi {
    pub fn new(authenticator: RequestAuthenticator) -> Self {
        Self { authenticator }
    }

    pub async fn user_info(&self) -> Result<User, ApiError> {
        self.authenticator
            .send_json(ApiRequest::get(USER_INFO_PATH))
            .await
    }

    /// Returns the server's confirmation message, if it sent one
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<String>, ApiError> {
        let request = ApiRequest::post(CHANGE_PASSWORD_PATH).json(&ChangePasswordRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        let response = self.authenticator.execute(request).await?;
        if !response.is_success() {
            // The body carries the field-level explanation
            return Err(ApiError::BadRequest(response.body));
        }
        Ok(response.json::<MessageResponse>().ok().map(|m| m.detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{json_response, status_response, FakeTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_never_attaches_token() {
        let transport = FakeTransport::new(|_| json_response(200, json!({"access": "A1", "refresh": "R1"})));
        let api = AuthApi::new(transport.clone());

        let tokens = api.login("bob", "pw").await.expect("login");
        assert_eq!(tokens.access, "A1");
        assert_eq!(tokens.refresh, "R1");

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, LOGIN_PATH);
        assert!(sent[0].bearer.is_none());
        assert_eq!(sent[0].body.as_ref().expect("body")["username"], "bob");
    }

    #[tokio::test]
    async fn test_login_empty_body_is_invalid_response() {
        let transport = FakeTransport::new(|_| status_response(200));
        let api = AuthApi::new(transport);
        assert!(matches!(api.login("bob", "pw").await, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token() {
        let transport = FakeTransport::new(|_| json_response(200, json!({"access": "A2"})));
        let api = AuthApi::new(transport.clone());

        assert_eq!(api.refresh("R1").await.expect("refresh"), "A2");
        let sent = transport.requests();
        assert_eq!(sent[0].path, REFRESH_PATH);
        assert_eq!(sent[0].body.as_ref().expect("body"), &json!({"refresh": "R1"}));
        assert!(sent[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejects_blank_access_token() {
        let transport = FakeTransport::new(|_| json_response(200, json!({"access": ""})));
        let api = AuthApi::new(transport);
        assert!(matches!(api.refresh("R1").await, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_register_maps_conflict() {
        let transport = FakeTransport::new(|_| status_response(409));
        let api = AuthApi::new(transport);
        let request = RegisterRequest {
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            password: "pw".to_string(),
            first_name: None,
            last_name: None,
        };
        assert!(matches!(api.register(&request).await, Err(ApiError::Conflict(_))));
    }
}

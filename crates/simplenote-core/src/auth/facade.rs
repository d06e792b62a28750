use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::authority::SessionAuthority;
use super::monitor::SessionMonitor;
use super::session::{SessionData, TOKEN_LIFETIME_SECS};
use super::store::TokenStore;
use crate::api::{AccountApi, ApiError, AuthApi};
use crate::cache::UserCache;
use crate::models::{RegisterRequest, User};

/// User-facing outcome of an account operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    Error(String),
}

impl AuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResult::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChangeResult {
    /// Confirmation message to show the user
    Changed(String),
    Error(String),
}

/// Entry points for signing in and out.
///
/// Owns the glue between the token store, the background monitor and the
/// cached profile. This is the only place user-facing error strings are made.
#[derive(Clone)]
pub struct SessionFacade {
    store: TokenStore,
    authority: SessionAuthority,
    monitor: SessionMonitor,
    auth_api: AuthApi,
    account: AccountApi,
    users: UserCache,
}

impl SessionFacade {
    pub fn new(
        store: TokenStore,
        authority: SessionAuthority,
        monitor: SessionMonitor,
        auth_api: AuthApi,
        account: AccountApi,
        users: UserCache,
    ) -> Self {
        Self {
            store,
            authority,
            monitor,
            auth_api,
            account,
            users,
        }
    }

    /// Sign in with a username and password.
    ///
    /// Remote failures come back as `AuthResult::Error` with the session
    /// untouched. `Err` means the tokens were issued but could not be saved.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResult> {
        let tokens = match self.auth_api.login(username, password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!(error = %e, "Login rejected");
                return Ok(AuthResult::Error(login_error_message(&e)));
            }
        };

        let session = SessionData::issued(&tokens.access, &tokens.refresh, TOKEN_LIFETIME_SECS, Utc::now())?
            .with_username(username);
        self.store.replace(session)?;
        info!(username = %username, "Logged in");

        // A missing profile is not worth failing the login over
        self.reload_user().await;
        self.monitor.start();
        Ok(AuthResult::Success)
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult {
        match self.auth_api.register(request).await {
            Ok(()) => {
                info!(username = %request.username, "Account registered");
                AuthResult::Success
            }
            Err(e) => {
                debug!(error = %e, "Registration rejected");
                AuthResult::Error(register_error_message(&e))
            }
        }
    }

    /// Stop the monitor and forget the session and profile.
    ///
    /// Every step runs even if an earlier one fails; the first storage error
    /// is returned afterwards.
    pub fn logout(&self) -> Result<()> {
        self.monitor.stop();
        let cleared = self.store.clear();
        let forgotten = self.users.clear();
        if let Err(ref e) = forgotten {
            warn!(error = %e, "Failed to clear cached user");
        }
        info!("Logged out");
        cleared.and(forgotten)
    }

    /// Resume monitoring for a session saved by an earlier run.
    /// Returns whether there was one.
    pub fn restore(&self) -> bool {
        if !self.store.is_logged_in() {
            return false;
        }
        debug!("Restoring saved session");
        self.monitor.start();
        true
    }

    pub async fn refresh_token(&self) -> AuthResult {
        if self.authority.refresh().await {
            AuthResult::Success
        } else {
            AuthResult::Error("Token refresh failed".to_string())
        }
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> PasswordChangeResult {
        if old_password.trim().is_empty() || new_password.trim().is_empty() {
            return PasswordChangeResult::Error("All fields are required.".to_string());
        }
        match self.account.change_password(old_password, new_password).await {
            Ok(detail) => {
                info!("Password changed");
                PasswordChangeResult::Changed(
                    detail.unwrap_or_else(|| "Password changed successfully.".to_string()),
                )
            }
            Err(ApiError::NetworkError(_)) => {
                PasswordChangeResult::Error("Network error. Please try again.".to_string())
            }
            Err(ApiError::BadRequest(body)) if !body.trim().is_empty() => PasswordChangeResult::Error(body),
            Err(ApiError::BadRequest(_)) => PasswordChangeResult::Error("Unknown error".to_string()),
            Err(e) => PasswordChangeResult::Error(e.to_string()),
        }
    }

    /// Fetch the profile from the server and cache it.
    /// Failures are logged and leave the cached profile as it was.
    pub async fn reload_user(&self) -> Option<User> {
        let user = match self.account.user_info().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to fetch user info");
                return None;
            }
        };
        if let Err(e) = self.users.put(user.clone()) {
            warn!(error = %e, "Failed to cache user info");
        }
        Some(user)
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.is_logged_in()
    }

    /// Observe login state. Changes only when an access token appears or goes away.
    pub fn logged_in(&self) -> watch::Receiver<bool> {
        self.store.logged_in()
    }

    pub fn current_user(&self) -> Option<User> {
        self.users.get()
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<User>> {
        self.users.subscribe()
    }

    /// Username the current session was opened with
    pub fn username(&self) -> Option<String> {
        self.store.read().username
    }

    pub fn session(&self) -> SessionData {
        self.store.read()
    }

    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }
}

fn login_error_message(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized => "Invalid username or password".to_string(),
        ApiError::Unprocessable(_) => "Invalid input data".to_string(),
        ApiError::NetworkError(e) => format!("Network error: {}", e),
        ApiError::InvalidResponse(_) => "Login failed: Empty response".to_string(),
        other => format!("Login failed: {}", other),
    }
}

fn register_error_message(err: &ApiError) -> String {
    match err {
        ApiError::BadRequest(_) => "Registration failed: Invalid data".to_string(),
        ApiError::Conflict(_) => "Username or email already exists".to_string(),
        ApiError::NetworkError(e) => format!("Network error: {}", e),
        other => format!("Registration failed: {}", other),
    }
}

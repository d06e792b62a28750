use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};

use super::session::TOKEN_LIFETIME_SECS;
use super::store::TokenStore;
use crate::api::AuthApi;

/// How a refresh attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token is in the store
    Refreshed,
    /// The session cannot be refreshed: no refresh token, the server
    /// refused it, answered with garbage, or the session changed meanwhile
    Rejected(String),
    /// The attempt broke down before an answer was obtained or stored
    /// (network failure, storage failure). Trying again later may work.
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}

type Flight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Performs the refresh-token exchange and owns the freshness policy.
///
/// Concurrent `refresh()` calls are single-flighted: while one exchange is
/// running, later callers wait for it and share its result instead of
/// starting their own.
#[derive(Clone)]
pub struct SessionAuthority {
    inner: Arc<Inner>,
}

struct Inner {
    store: TokenStore,
    api: AuthApi,
    lifetime_secs: i64,
    in_flight: Mutex<Option<Flight>>,
}

impl SessionAuthority {
    pub fn new(store: TokenStore, api: AuthApi) -> Self {
        Self::with_lifetime(store, api, TOKEN_LIFETIME_SECS)
    }

    /// Use a different assumed access token lifetime
    pub fn with_lifetime(store: TokenStore, api: AuthApi, lifetime_secs: i64) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                lifetime_secs,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `false` without touching the network when there is no refresh
    /// token, and `false` with the store untouched on any failure.
    pub async fn refresh(&self) -> bool {
        self.refresh_outcome().await.is_refreshed()
    }

    /// Like `refresh`, but tells a refused session apart from a transient failure
    pub async fn refresh_outcome(&self) -> RefreshOutcome {
        let flight = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let flight = async move {
                        let outcome = inner.exchange().await;
                        *inner.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        match AssertUnwindSafe(flight.clone()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Token refresh panicked");
                // A panicked flight would poison every later join
                let mut slot = self
                    .inner
                    .in_flight
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                if slot.as_ref().is_some_and(|f| f.ptr_eq(&flight)) {
                    *slot = None;
                }
                RefreshOutcome::Failed("refresh panicked".to_string())
            }
        }
    }

    /// Refresh only if the policy says the token is about to expire.
    /// Returns whether a usable token is believed to be in place.
    pub async fn ensure_fresh(&self) -> bool {
        if self.inner.store.read().needs_refresh() {
            self.refresh().await
        } else {
            true
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }
}

impl Inner {
    async fn exchange(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("No refresh token, skipping refresh");
            return RefreshOutcome::Rejected("no refresh token".to_string());
        };

        let access_token = match self.api.refresh(&refresh_token).await {
            Ok(token) => token,
            Err(e) if e.is_network() => {
                warn!(error = %e, "Token refresh could not reach the server");
                return RefreshOutcome::Failed(e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Token refresh rejected");
                return RefreshOutcome::Rejected(e.to_string());
            }
        };

        match self
            .store
            .rotate_access(&refresh_token, &access_token, self.lifetime_secs)
        {
            Ok(true) => {
                info!("Access token refreshed");
                RefreshOutcome::Refreshed
            }
            Ok(false) => {
                debug!("Session changed during refresh, discarding new token");
                RefreshOutcome::Rejected("session changed during refresh".to_string())
            }
            Err(e) => {
                error!(error = %e, "Failed to persist refreshed token");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }
}

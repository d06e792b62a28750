use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Assumed access token lifetime in seconds.
/// The backend does not report a TTL, so every login and refresh resets
/// freshness to one hour from now.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Buffer before expiry at which a proactive refresh is due (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// The persisted authentication state.
///
/// An access token being present is what makes the user "logged in";
/// `expires_at` only decides when to refresh proactively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub username: Option<String>,
}

impl SessionData {
    /// A freshly issued session expiring `ttl_secs` from `now`.
    /// Fails when the expiry falls outside the representable date range.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow!("Token lifetime of {}s is out of range", ttl_secs))?;
        Ok(Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            expires_at: Some(expires_at),
            username: None,
        })
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the access token is unusable. An unknown expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now >= expiry,
            None => true,
        }
    }

    /// Whether the session is within the refresh buffer of its expiry.
    /// Without a known expiry there is nothing to refresh ahead of.
    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now >= expiry - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|expiry| (expiry - Utc::now()).num_minutes().max(0))
    }
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::session::SessionData;

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

/// Durable, process-wide holder of the authentication state.
///
/// Every write is persisted first and only then published, so memory never
/// runs ahead of disk. Readers always get a whole `SessionData` snapshot.
/// Clone is cheap and all clones share the same state.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
    session: watch::Sender<SessionData>,
    logged_in: watch::Sender<bool>,
}

impl TokenStore {
    /// Open the store backed by `path`, loading any session saved there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = Self::load(&path)?;
        debug!(path = ?path, logged_in = data.is_logged_in(), "Token store opened");
        Ok(Self::with_state(Some(path), data))
    }

    /// Open the store at the conventional location inside `cache_dir`
    pub fn open_in(cache_dir: &Path) -> Result<Self> {
        Self::open(cache_dir.join(SESSION_FILE))
    }

    /// A store that lives only as long as the process. Used in tests.
    pub fn in_memory() -> Self {
        Self::with_state(None, SessionData::default())
    }

    fn with_state(path: Option<PathBuf>, data: SessionData) -> Self {
        let (logged_in, _) = watch::channel(data.is_logged_in());
        let (session, _) = watch::channel(data);
        Self {
            inner: Arc::new(Inner {
                path,
                write_lock: Mutex::new(()),
                session,
                logged_in,
            }),
        }
    }

    fn load(path: &Path) -> Result<SessionData> {
        if !path.exists() {
            return Ok(SessionData::default());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        match serde_json::from_str(&contents) {
            Ok(data) => Ok(data),
            Err(e) => {
                // The next write replaces it.
                warn!(error = %e, "Session file is corrupt, starting logged out");
                Ok(SessionData::default())
            }
        }
    }

    /// Consistent snapshot of the current session
    pub fn read(&self) -> SessionData {
        self.inner.session.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .borrow()
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .session
            .borrow()
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub fn is_logged_in(&self) -> bool {
        *self.inner.logged_in.borrow()
    }

    /// Store a token pair expiring `ttl_secs` from now.
    /// The remembered username is kept.
    pub fn write(&self, access_token: &str, refresh_token: &str, ttl_secs: i64) -> Result<()> {
        let mut next = SessionData::issued(access_token, refresh_token, ttl_secs, Utc::now())?;
        self.update(|current| {
            next.username = current.username.clone();
            next
        })
    }

    /// Replace the whole session in one write
    pub fn replace(&self, data: SessionData) -> Result<()> {
        self.update(|_| data)
    }

    /// Install a refreshed access token, keeping `refresh_token`.
    ///
    /// Only applies while the session still holds that refresh token, so a
    /// refresh finishing after logout cannot bring the session back.
    /// Returns whether the write happened.
    pub fn rotate_access(&self, refresh_token: &str, access_token: &str, ttl_secs: i64) -> Result<bool> {
        let mut next = SessionData::issued(access_token, refresh_token, ttl_secs, Utc::now())?;
        self.update_if(|current| {
            if current.refresh_token.as_deref() != Some(refresh_token) {
                return None;
            }
            next.username = current.username.clone();
            Some(next)
        })
    }

    /// Forget all tokens and the username
    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(ref path) = self.inner.path {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to delete session file")?;
            }
        }
        self.publish(SessionData::default());
        debug!("Session cleared");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&SessionData) -> SessionData) -> Result<()> {
        self.update_if(|current| Some(f(current))).map(|_| ())
    }

    fn update_if(&self, f: impl FnOnce(&SessionData) -> Option<SessionData>) -> Result<bool> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let next = {
            let current = self.inner.session.borrow();
            f(&current)
        };
        let Some(next) = next else {
            return Ok(false);
        };
        self.persist(&next)?;
        self.publish(next);
        Ok(true)
    }

    fn persist(&self, data: &SessionData) -> Result<()> {
        let Some(ref path) = self.inner.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, path).context("Failed to replace session file")?;
        Ok(())
    }

    fn publish(&self, data: SessionData) {
        let logged_in = data.is_logged_in();
        self.inner.session.send_replace(data);
        self.inner.logged_in.send_if_modified(|current| {
            if *current == logged_in {
                false
            } else {
                *current = logged_in;
                true
            }
        });
    }

    /// Observe every change to the session
    pub fn subscribe(&self) -> watch::Receiver<SessionData> {
        self.inner.session.subscribe()
    }

    /// Observe logged-in transitions only
    pub fn logged_in(&self) -> watch::Receiver<bool> {
        self.inner.logged_in.subscribe()
    }
}

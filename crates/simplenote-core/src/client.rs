//! Composition root: builds one session and everything that shares it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::api::{AccountApi, AuthApi, HttpTransport, NotesApi, RequestAuthenticator, Transport};
use crate::auth::{SessionAuthority, SessionFacade, SessionMonitor, TokenStore};
use crate::cache::{CacheManager, NoteCache, UserCache};
use crate::config::Config;
use crate::notes::NotesRepository;

/// A signed-in (or not yet signed-in) client.
///
/// Every component inside shares the same `TokenStore`, so a refresh done by
/// one is seen by all. Clone is cheap.
#[derive(Clone)]
pub struct SimpleNote {
    session: SessionFacade,
    notes: NotesRepository,
}

impl SimpleNote {
    /// Talk to the configured server, keeping state in the cache directory
    pub fn open(config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        Self::open_in(config, &cache_dir)
    }

    pub fn open_in(config: &Config, cache_dir: &Path) -> Result<Self> {
        let transport = HttpTransport::with_timeout(config.api_base_url.as_str(), config.request_timeout())?;
        debug!(base_url = %transport.base_url(), cache_dir = ?cache_dir, "Opening client");
        let files = CacheManager::new(cache_dir.to_path_buf())?;
        let store = TokenStore::open_in(cache_dir)?;
        Ok(Self::assemble(Arc::new(transport), store, files, config.monitor_interval()))
    }

    /// Wire the components around an existing transport and store
    pub fn assemble(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        files: CacheManager,
        monitor_interval: Duration,
    ) -> Self {
        let auth_api = AuthApi::new(Arc::clone(&transport));
        let authority = SessionAuthority::new(store.clone(), auth_api.clone());
        let authenticator = RequestAuthenticator::new(transport, store.clone(), authority.clone());
        let monitor = SessionMonitor::with_interval(authority.clone(), monitor_interval);

        let session = SessionFacade::new(
            store,
            authority.clone(),
            monitor,
            auth_api,
            AccountApi::new(authenticator.clone()),
            UserCache::open(files.clone()),
        );
        let notes = NotesRepository::new(NotesApi::new(authenticator), authority, NoteCache::open(files));
        Self { session, notes }
    }

    pub fn session(&self) -> &SessionFacade {
        &self.session
    }

    pub fn notes(&self) -> &NotesRepository {
        &self.notes
    }
}

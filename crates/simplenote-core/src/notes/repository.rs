use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::notes::DEFAULT_PAGE_SIZE;
use crate::api::{ApiError, NotesApi};
use crate::auth::SessionAuthority;
use crate::cache::{NoteCache, NoteChange};
use crate::models::{Note, NoteRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteResult {
    Success,
    Error(String),
}

impl NoteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, NoteResult::Success)
    }
}

/// Reads come from the cache; writes try the server first.
///
/// `Err` from a write means the local cache could not be saved. Server-side
/// failures either fall back to a local change or come back as
/// `NoteResult::Error`.
#[derive(Clone)]
pub struct NotesRepository {
    api: NotesApi,
    authority: SessionAuthority,
    cache: NoteCache,
}

impl NotesRepository {
    pub fn new(api: NotesApi, authority: SessionAuthority, cache: NoteCache) -> Self {
        Self {
            api,
            authority,
            cache,
        }
    }

    pub fn list_notes(&self) -> Vec<Note> {
        self.cache.list()
    }

    pub fn get_note(&self, id: i64) -> Option<Note> {
        self.cache.get(id)
    }

    /// Local search over title and description
    pub fn search_notes(&self, query: &str) -> Vec<Note> {
        self.cache.search(query)
    }

    /// Ask the server to search titles
    pub async fn search_remote(&self, query: &str) -> Result<Vec<Note>, ApiError> {
        self.api.filter(Some(query), None, None).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoteChange> {
        self.cache.subscribe()
    }

    /// How long ago notes were last fetched from the server
    pub fn cache_age(&self) -> Option<String> {
        self.cache.age_display()
    }

    pub fn cache_is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    /// Replace the cached notes with the server's first page.
    /// Local-only notes are kept.
    pub async fn refresh_notes(&self) -> Result<NoteResult> {
        if !self.authority.ensure_fresh().await {
            return Ok(NoteResult::Error("Authentication failed".to_string()));
        }

        let page = match self.api.list(1, DEFAULT_PAGE_SIZE).await {
            Ok(page) => page,
            Err(ApiError::NetworkError(e)) => {
                return Ok(NoteResult::Error(format!("Network error: {}", e)))
            }
            Err(ApiError::InvalidResponse(_)) => {
                return Ok(NoteResult::Error("Empty response from server".to_string()))
            }
            Err(e) => return Ok(NoteResult::Error(format!("Failed to refresh notes: {}", e))),
        };

        let fetched = page.results.len();
        let mut notes = page.results;
        notes.extend(self.cache.list().into_iter().filter(Note::is_local_only));
        self.cache.replace_all(notes)?;
        info!(fetched, total = page.count, "Notes refreshed");
        Ok(NoteResult::Success)
    }

    /// Upload local-only notes, then refresh from the server
    pub async fn sync_notes(&self) -> Result<NoteResult> {
        let pending: Vec<Note> = self
            .cache
            .list()
            .into_iter()
            .filter(Note::is_local_only)
            .collect();

        if !pending.is_empty() {
            if !self.authority.ensure_fresh().await {
                return Ok(NoteResult::Error("Authentication failed".to_string()));
            }
            let requests: Vec<NoteRequest> = pending
                .iter()
                .map(|n| NoteRequest {
                    title: n.title.clone(),
                    description: n.description.clone(),
                })
                .collect();
            let created = match self.api.bulk_create(&requests).await {
                Ok(created) => created.results,
                Err(e) => return Ok(NoteResult::Error(format!("Sync failed: {}", e))),
            };
            let local_ids: Vec<i64> = pending.iter().map(|n| n.id).collect();
            self.cache.swap_uploaded(&local_ids, created)?;
            info!(uploaded = pending.len(), "Local notes uploaded");
        }

        self.refresh_notes().await
    }

    pub async fn create_note(&self, title: &str, content: &str) -> Result<NoteResult> {
        match self.api.create(&note_request(title, content)).await {
            Ok(note) => {
                debug!(id = note.id, "Note created");
                self.cache.put(note)?;
            }
            Err(ApiError::InvalidResponse(_)) => {
                return Ok(NoteResult::Error("Failed to create note: Empty response".to_string()))
            }
            Err(e) => {
                let now = timestamp();
                let note = Note {
                    id: self.cache.next_local_id(),
                    title: title.to_string(),
                    description: content.to_string(),
                    created_at: now.clone(),
                    updated_at: now,
                    creator_name: None,
                    creator_username: None,
                };
                warn!(error = %e, id = note.id, "Server did not take the note, keeping it locally");
                self.cache.put(note)?;
            }
        }
        Ok(NoteResult::Success)
    }

    pub async fn update_note(&self, id: i64, title: &str, content: &str) -> Result<NoteResult> {
        // The server has never seen a local-only note
        if id < 0 {
            return self.update_locally(id, title, content, "Note not found locally");
        }

        match self.api.update(id, &note_request(title, content)).await {
            Ok(note) => {
                debug!(id, "Note updated");
                self.cache.put(note)?;
                Ok(NoteResult::Success)
            }
            Err(ApiError::InvalidResponse(_)) => {
                Ok(NoteResult::Error("Failed to update note".to_string()))
            }
            Err(e) if e.is_network() => {
                warn!(error = %e, id, "Could not reach server, updating note locally");
                self.update_locally(id, title, content, "Note not found locally")
            }
            Err(e) => {
                warn!(error = %e, id, "Server refused update, updating note locally");
                self.update_locally(id, title, content, "Note not found")
            }
        }
    }

    /// Removes the note locally whatever the server says
    pub async fn delete_note(&self, id: i64) -> Result<NoteResult> {
        if id >= 0 {
            if let Err(e) = self.api.delete(id).await {
                warn!(error = %e, id, "Server did not delete note, removing it locally");
            }
        }
        self.cache.delete(id)?;
        Ok(NoteResult::Success)
    }

    fn update_locally(&self, id: i64, title: &str, content: &str, missing: &str) -> Result<NoteResult> {
        let Some(mut note) = self.cache.get(id) else {
            return Ok(NoteResult::Error(missing.to_string()));
        };
        note.title = title.to_string();
        note.description = content.to_string();
        note.updated_at = timestamp();
        self.cache.put(note)?;
        Ok(NoteResult::Success)
    }
}

fn note_request(title: &str, content: &str) -> NoteRequest {
    NoteRequest {
        title: title.to_string(),
        description: content.to_string(),
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

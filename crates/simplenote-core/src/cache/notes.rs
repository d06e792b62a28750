use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::manager::{age_display, is_stale, CacheManager};
use crate::models::Note;

const NOTES_CACHE: &str = "notes";

/// Buffer size for the change notification channel
const CHANGE_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteChange {
    Upserted(i64),
    Deleted(i64),
    /// The whole set was replaced or cleared
    Reloaded,
}

/// Notes keyed by id, persisted as one snapshot.
///
/// Clone is cheap and all clones share the same notes.
#[derive(Clone)]
pub struct NoteCache {
    inner: Arc<Inner>,
}

struct Inner {
    files: CacheManager,
    state: Mutex<State>,
    changes: broadcast::Sender<NoteChange>,
}

struct State {
    notes: BTreeMap<i64, Note>,
    /// Last time the server's notes were merged in. Local writes leave it alone.
    synced_at: Option<DateTime<Utc>>,
}

/// On-disk form of the cache
#[derive(Serialize, Deserialize)]
struct Snapshot {
    notes: Vec<Note>,
    #[serde(default)]
    synced_at: Option<DateTime<Utc>>,
}

impl NoteCache {
    pub fn open(files: CacheManager) -> Self {
        let (notes, synced_at) = match files.load::<Snapshot>(NOTES_CACHE) {
            Ok(Some(cached)) => {
                let notes = cached.data.notes.into_iter().map(|n| (n.id, n)).collect();
                (notes, cached.data.synced_at)
            }
            Ok(None) => (BTreeMap::new(), None),
            Err(e) => {
                warn!(error = %e, "Failed to load notes cache, starting empty");
                (BTreeMap::new(), None)
            }
        };
        debug!(count = notes.len(), "Notes cache opened");

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                files,
                state: Mutex::new(State { notes, synced_at }),
                changes,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, id: i64) -> Option<Note> {
        self.lock().notes.get(&id).cloned()
    }

    /// All notes, most recently updated first
    pub fn list(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.lock().notes.values().cloned().collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    pub fn search(&self, query: &str) -> Vec<Note> {
        self.list().into_iter().filter(|n| n.matches(query)).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a note
    pub fn put(&self, note: Note) -> Result<()> {
        let id = note.id;
        self.mutate(NoteChange::Upserted(id), false, |notes| {
            notes.insert(id, note);
            true
        })
        .map(|_| ())
    }

    /// Swap uploaded local notes for the server's copies in one write
    pub fn swap_uploaded(&self, local_ids: &[i64], uploaded: Vec<Note>) -> Result<()> {
        self.mutate(NoteChange::Reloaded, false, |notes| {
            for id in local_ids {
                notes.remove(id);
            }
            for note in uploaded {
                notes.insert(note.id, note);
            }
            true
        })
        .map(|_| ())
    }

    /// Replace everything with `incoming` from the server and mark the cache synced
    pub fn replace_all(&self, incoming: Vec<Note>) -> Result<()> {
        self.mutate(NoteChange::Reloaded, true, |notes| {
            *notes = incoming.into_iter().map(|n| (n.id, n)).collect();
            true
        })
        .map(|_| ())
    }

    /// Returns whether a note was removed
    pub fn delete(&self, id: i64) -> Result<bool> {
        self.mutate(NoteChange::Deleted(id), false, |notes| notes.remove(&id).is_some())
    }

    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        self.inner.files.remove(NOTES_CACHE)?;
        state.notes.clear();
        state.synced_at = None;
        drop(state);
        let _ = self.inner.changes.send(NoteChange::Reloaded);
        Ok(())
    }

    /// Id for a note that only exists locally: below every id in use
    pub fn next_local_id(&self) -> i64 {
        let lowest = self.lock().notes.keys().next().copied().unwrap_or(0);
        lowest.min(0) - 1
    }

    /// When the server's notes were last fetched, for display
    pub fn age_display(&self) -> Option<String> {
        self.lock().synced_at.map(age_display)
    }

    /// True when never synced or last synced over an hour ago
    pub fn is_stale(&self) -> bool {
        self.lock().synced_at.map_or(true, is_stale)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoteChange> {
        self.inner.changes.subscribe()
    }

    /// Apply `f` to a copy, persist it, then commit and notify.
    /// Nothing changes in memory if persisting fails. `synced` stamps the
    /// write as a server sync.
    fn mutate(
        &self,
        change: NoteChange,
        synced: bool,
        f: impl FnOnce(&mut BTreeMap<i64, Note>) -> bool,
    ) -> Result<bool> {
        let mut state = self.lock();
        let mut next = state.notes.clone();
        if !f(&mut next) {
            return Ok(false);
        }
        let synced_at = if synced { Some(Utc::now()) } else { state.synced_at };
        let snapshot = Snapshot {
            notes: next.values().cloned().collect(),
            synced_at,
        };
        self.inner.files.save(NOTES_CACHE, &snapshot)?;
        state.notes = next;
        state.synced_at = synced_at;
        drop(state);
        // No subscribers is fine
        let _ = self.inner.changes.send(change);
        Ok(true)
    }
}

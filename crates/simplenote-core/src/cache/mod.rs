//! Local caching module for offline data access.
//!
//! This module provides the `CacheManager` for storing JSON snapshots on
//! disk, plus the two caches built on it:
//!
//! - `NoteCache`: Notes keyed by id, with change notifications
//! - `UserCache`: The single signed-in user profile
//!
//! Snapshots are considered stale after 60 minutes.

pub mod manager;
pub mod notes;
pub mod user;

pub use manager::{CacheManager, CachedData};
pub use notes::{NoteCache, NoteChange};
pub use user::UserCache;

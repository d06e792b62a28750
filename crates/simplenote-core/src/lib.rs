//! SimpleNote core library.
//!
//! Session lifecycle, API client, local cache and notes repository shared by
//! SimpleNote front ends.
//!
//! # Modules
//!
//! - [`auth`]: Token storage, refresh, background monitoring and login/logout
//! - [`api`]: Transport seam, request authentication and typed endpoints
//! - [`cache`]: JSON file caches for the user profile and notes
//! - [`notes`]: Offline-tolerant notes repository
//! - [`config`]: Application configuration
//! - [`models`]: Wire and cache data types

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod notes;

#[cfg(test)]
mod testing;

pub use api::{ApiError, HttpTransport, Transport};
pub use auth::{
    AuthResult, MonitorState, PasswordChangeResult, SessionData, SessionFacade, SessionMonitor,
    TickOutcome, TokenStore,
};
pub use client::SimpleNote;
pub use config::Config;
pub use models::{Note, RegisterRequest, User};
pub use notes::{NoteResult, NotesRepository};

//! Data models for SimpleNote entities.
//!
//! This module contains the data structures exchanged with the SimpleNote
//! backend and persisted in the local cache:
//!
//! - `User`: The signed-in account profile
//! - `Note`, `NoteRequest`, `PaginatedResponse`: Notes and list pages
//! - Auth wire types: `LoginRequest`, `TokenResponse`, `RefreshTokenRequest`, etc.

pub mod auth;
pub mod note;
pub mod user;

pub use auth::{
    ChangePasswordRequest, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
    TokenRefreshResponse, TokenResponse,
};
pub use note::{Note, NoteRequest, PaginatedResponse};
pub use user::User;

//! Session lifecycle: storing tokens, refreshing them, and signing in and out.
//!
//! - `TokenStore`: durable, observable holder of the current `SessionData`
//! - `SessionAuthority`: exchanges the refresh token for a new access token
//! - `SessionMonitor`: background loop that refreshes shortly before expiry
//! - `SessionFacade`: login, register and logout

pub mod authority;
pub mod facade;
pub mod monitor;
pub mod session;
pub mod store;

pub use authority::{RefreshOutcome, SessionAuthority};
pub use facade::{AuthResult, PasswordChangeResult, SessionFacade};
pub use monitor::{MonitorState, SessionMonitor, TickOutcome, DEFAULT_MONITOR_INTERVAL};
pub use session::{SessionData, TOKEN_LIFETIME_SECS};
pub use store::{TokenStore, SESSION_FILE};

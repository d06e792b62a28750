//! REST API client module for the SimpleNote backend.
//!
//! Every outgoing call is an `ApiRequest` handed to a `Transport`. Calls that
//! need a signed-in user go through the `RequestAuthenticator`, which attaches
//! the access token and recovers from an expired one. Token issuance
//! (`AuthApi`) talks to the transport directly.

pub mod auth;
pub mod authenticator;
pub mod error;
pub mod notes;
pub mod transport;

pub use auth::{AccountApi, AuthApi};
pub use authenticator::RequestAuthenticator;
pub use error::ApiError;
pub use notes::NotesApi;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

//! Notes as the rest of the client sees them.
//!
//! The local cache is the source of truth for reads. Writes go to the server
//! first and fall back to a local-only change when the server cannot take
//! them; local-only notes carry negative ids until the next sync uploads them.

pub mod repository;

pub use repository::{NoteResult, NotesRepository};

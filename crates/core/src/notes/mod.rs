//! # Notes
//!
//! Character notes persisted in SQLite. Not used by the narration pipeline.

pub mod store;

pub use store::{NewNote, Note, NoteError, NotesStore};

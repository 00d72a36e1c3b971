//! Local persistence and sync engine for the hymnbook app.
//!
//! Two embedded SQLite stores live side by side: one for document groups
//! (trees of groups with documents at the leaves) and one for song bundles
//! together with the user's song list. Server payloads from [`remote`] are
//! converted and written by [`db::import`], removed again through
//! [`db::cascade`], and the song list is maintained by [`db::selection`].
//! Mutating operations report back through [`Outcome`] so a presentation
//! layer can show their message as is.
pub mod db;
pub mod error;
pub mod models;
pub mod outcome;
pub mod remote;
pub mod sync;

/// Store handle and configuration, used by `main.rs` to open the store a
/// command needs.
pub use db::{default_data_dir, Store, StoreConfig};

pub use error::{Result, StoreError};

/// Domain records handed out by the read side.
pub use models::{Document, DocumentGroup, Song, SongBundle, SongList, SongListEntry, Verse};

pub use outcome::Outcome;

/// Payload types as delivered by the server.
pub use remote::{RemoteDocument, RemoteDocumentGroup, RemoteSong, RemoteSongBundle, RemoteVerse};

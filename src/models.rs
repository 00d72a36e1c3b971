//! Domain records that mirror the SQLite tables of the document and song
//! stores. They stay plain data holders: owned children are referenced by id
//! lists (`group_ids`, `item_ids`, ...) in the order of their membership
//! table, and nothing points back at its parent. Parent lookups go through the
//! back-reference queries in `db::documents` and `db::songs`.

use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
/// A node in the document tree. Owns nested groups and documents.
pub struct DocumentGroup {
    /// Store-unique key allocated by the importer.
    pub id: i64,
    pub name: String,
    pub language: String,
    /// Identity of the group on the remote server, used to match updates.
    pub uuid: String,
    /// Content hash reported by the server; compared to detect updates.
    pub hash: Option<String>,
    /// Number of documents reachable through this group, counted when the
    /// tree was imported.
    pub size: i64,
    /// Only the top-level group of an import is a root; the overview lists
    /// roots only.
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Owned child groups, in stored order.
    pub group_ids: Vec<i64>,
    /// Owned documents, in stored order.
    pub item_ids: Vec<i64>,
}

impl fmt::Display for DocumentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A terminal record of the document tree. The owning group is found with
/// `db::documents::parent_of_document`.
pub struct Document {
    pub id: i64,
    pub name: String,
    /// HTML markup rendered by the viewer.
    pub content: String,
    pub language: String,
    pub uuid: String,
    /// Position among its siblings, as sent by the server.
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A flat container of songs (a hymn book). `size` is the song count at
/// import time.
pub struct SongBundle {
    pub id: i64,
    pub abbreviation: String,
    pub name: String,
    pub language: String,
    pub author: String,
    pub copyright: String,
    pub uuid: String,
    pub hash: Option<String>,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub song_ids: Vec<i64>,
}

impl fmt::Display for SongBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: i64,
    pub name: String,
    /// Number printed in the physical book, when the bundle uses numbering.
    pub number: Option<i64>,
    pub author: String,
    pub copyright: String,
    pub language: String,
    pub uuid: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub verse_ids: Vec<i64>,
}

impl Song {
    /// `number. name` when the song is numbered, the bare name otherwise.
    pub fn display_title(&self) -> String {
        match self.number {
            Some(number) => format!("{number}. {}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_title())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verse {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub language: String,
    pub order_index: i64,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq)]
/// The user's "current selection" of songs.
pub struct SongList {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub entry_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
/// One position in a [`SongList`]. `song_id` is a non-owning reference: it
/// turns into `None` once the song is deleted through its bundle, and the
/// entry then waits for `db::selection::cleanup_orphans`.
pub struct SongListEntry {
    pub id: i64,
    pub index: i64,
    pub song_id: Option<i64>,
    pub selected_verse_ids: Vec<i64>,
}

impl SongListEntry {
    pub fn is_orphaned(&self) -> bool {
        self.song_id.is_none()
    }
}

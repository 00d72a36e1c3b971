//! Persistence module split across logical submodules: the store handle and
//! its schemas, the read side for each store, and the three mutating
//! components (importing trees, cascading deletes, the song list).

pub mod cascade;
mod connection;
mod documents;
pub mod import;
mod schema;
pub mod selection;
mod songs;

pub use cascade::{
    delete_all, delete_document_group, delete_song_bundle, BundleDeleteSummary, DeleteSummary,
};
pub use connection::{default_data_dir, Store, StoreConfig};
pub use documents::{
    child_groups, documents_of, find_document, find_group, find_groups_by_name,
    find_root_groups_by_name, find_root_groups_by_uuid, load_root_groups, parent_of_document,
};
pub use import::{
    convert_document_group, convert_song_bundle, import_document_group, import_song_bundle,
    update_document_group, update_song_bundle, ConvertedDocumentGroup, ConvertedSongBundle,
    IdCounters, SongIdCounters,
};
pub use schema::{
    attach, member_ids, owner_of, reorder, Field, FieldKind, Relation, Schema, DOCUMENT_GROUP_SCHEMA,
    DOCUMENT_SCHEMA, SONG_BUNDLE_SCHEMA, SONG_LIST_SCHEMA, SONG_LIST_SONG_SCHEMA,
    SONG_LIST_VERSE_SCHEMA, SONG_SCHEMA, VERSE_SCHEMA,
};
pub use songs::{
    bundle_of_song, find_bundle, find_bundles_by_name, find_bundles_by_uuid, find_song,
    load_song_bundles, songs_of, verses_of,
};

//! Deleting stored trees together with everything they own.
//!
//! Document groups are removed bottom-up, one transaction per group, so a
//! failure half-way leaves the groups already visited deleted and the rest
//! of the tree intact. A song bundle goes in one transaction.

use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::db::connection::Store;
use crate::db::documents::find_group;
use crate::db::schema::{member_ids, DOCUMENT_GROUP_ITEMS, SONG_BUNDLE_SONGS, SONG_VERSES};
use crate::db::selection;
use crate::db::songs::find_bundle;
use crate::error::{Result, StoreError};
use crate::models::{DocumentGroup, SongBundle};
use crate::outcome::Outcome;

/// What a document group delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub name: String,
    pub groups_deleted: usize,
    pub documents_deleted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleDeleteSummary {
    pub name: String,
    pub songs_deleted: usize,
    pub verses_deleted: usize,
}

/// Delete `group`, all of its descendant groups and their documents.
///
/// The group is looked up by id; when it is gone already nothing changes and
/// the outcome reports it under the name of the caller's copy.
pub fn delete_document_group(store: &Store, group: &DocumentGroup) -> Outcome<DeleteSummary> {
    Outcome::from_result(remove_document_group(store, group), |summary| {
        format!("Deleted all for {}", summary.name)
    })
}

pub(crate) fn remove_document_group(store: &Store, group: &DocumentGroup) -> Result<DeleteSummary> {
    if !store.is_connected() {
        warn!(group = %group.name, "Cannot delete document group: document database is not connected");
        return Err(StoreError::NotConnected);
    }

    let Some(stored) = find_group(store, group.id)? else {
        warn!(group = %group.name, id = group.id, "Cannot find document group in database");
        return Err(StoreError::not_found("document group", &group.name));
    };

    let mut summary = DeleteSummary {
        name: stored.name.clone(),
        ..Default::default()
    };

    // Snapshot: the membership rows vanish while the children are deleted.
    let child_ids = stored.group_ids.clone();
    for child_id in child_ids {
        let Some(child) = find_group(store, child_id)? else {
            continue;
        };
        let removed = remove_document_group(store, &child)?;
        summary.groups_deleted += removed.groups_deleted;
        summary.documents_deleted += removed.documents_deleted;
    }

    let documents_deleted = store
        .with_transaction(|conn| delete_group_row(conn, stored.id))
        .inspect_err(|err| error!(group = %stored.name, %err, "Failed to delete document group"))?;

    summary.groups_deleted += 1;
    summary.documents_deleted += documents_deleted;

    if stored.is_root {
        info!(
            group = %summary.name,
            groups = summary.groups_deleted,
            documents = summary.documents_deleted,
            "deleted document group"
        );
    }

    Ok(summary)
}

fn delete_group_row(conn: &Connection, group_id: i64) -> Result<usize> {
    let document_ids = member_ids(conn, &DOCUMENT_GROUP_ITEMS, group_id)?;
    let mut delete_document = conn.prepare("DELETE FROM documents WHERE id = ?1")?;
    for id in &document_ids {
        delete_document.execute([id])?;
    }

    conn.execute("DELETE FROM document_groups WHERE id = ?1", [group_id])?;
    Ok(document_ids.len())
}

/// Delete `bundle` with its songs and verses, then drop song list entries
/// that pointed at those songs.
pub fn delete_song_bundle(store: &Store, bundle: &SongBundle) -> Outcome<BundleDeleteSummary> {
    Outcome::from_result(remove_song_bundle(store, bundle), |summary| {
        format!("Deleted all {} songs for {}", summary.songs_deleted, summary.name)
    })
}

pub(crate) fn remove_song_bundle(store: &Store, bundle: &SongBundle) -> Result<BundleDeleteSummary> {
    if !store.is_connected() {
        warn!(bundle = %bundle.name, "Cannot delete song bundle: song database is not connected");
        return Err(StoreError::NotConnected);
    }

    let Some(stored) = find_bundle(store, bundle.id)? else {
        warn!(bundle = %bundle.name, id = bundle.id, "Cannot find song bundle in database");
        return Err(StoreError::not_found("song bundle", &bundle.name));
    };

    let summary = store
        .with_transaction(|conn| {
            let mut summary = BundleDeleteSummary {
                name: stored.name.clone(),
                ..Default::default()
            };

            let mut delete_verse = conn.prepare("DELETE FROM verses WHERE id = ?1")?;
            let mut delete_song = conn.prepare("DELETE FROM songs WHERE id = ?1")?;
            for song_id in member_ids(conn, &SONG_BUNDLE_SONGS, stored.id)? {
                for verse_id in member_ids(conn, &SONG_VERSES, song_id)? {
                    delete_verse.execute([verse_id])?;
                    summary.verses_deleted += 1;
                }
                delete_song.execute([song_id])?;
                summary.songs_deleted += 1;
            }

            conn.execute("DELETE FROM song_bundles WHERE id = ?1", [stored.id])?;
            Ok(summary)
        })
        .inspect_err(|err| error!(bundle = %stored.name, %err, "Failed to delete song bundle"))?;

    info!(bundle = %summary.name, songs = summary.songs_deleted, "deleted song bundle");

    selection::prune_orphans(store)?;
    Ok(summary)
}

/// Throw away the whole store file and start over with an empty schema.
pub fn delete_all(store: &mut Store) -> Outcome<()> {
    let label = store.config().label;

    if let Err(err) = store.delete_file() {
        error!(store = label, %err, "Failed to delete database");
        return Outcome::failed(err);
    }

    match store.connect() {
        Ok(()) => Outcome::succeeded(format!("Deleted all {label}"), ()),
        Err(err) => {
            error!(store = label, %err, "Could not reconnect after deleting database");
            Outcome::failed_with(
                format!("Could not reconnect to local database after deletions: {err}"),
                err,
            )
        }
    }
}

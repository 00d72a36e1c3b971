//! The song list the user builds up for a service.
//!
//! Entries refer to songs without owning them. Deleting a song nulls the
//! entry's reference, and [`cleanup_orphans`] later drops such entries and
//! renumbers the rest. After every mutation here the list indices form
//! `0..n-1` again.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, error, info, warn};

use crate::db::connection::Store;
use crate::db::schema::{
    attach, member_ids, reorder, SONG_LIST_SCHEMA, SONG_LIST_SONGS, SONG_LIST_SONG_SCHEMA,
    SONG_LIST_SONG_VERSES, SONG_LIST_VERSE_SCHEMA, SONG_VERSES,
};
use crate::db::songs::find_song_in;
use crate::error::{Result, StoreError};
use crate::models::{Song, SongList, SongListEntry};
use crate::outcome::Outcome;

pub const DEFAULT_LIST_NAME: &str = "Default";

/// Every stored song list, oldest first, with its entry ids in list order.
pub fn all_lists(store: &Store) -> Result<Vec<SongList>> {
    let conn = store.conn()?;
    let mut stmt =
        conn.prepare("SELECT id, name, created_at, modified_at FROM song_lists ORDER BY id")?;
    let lists = stmt
        .query_map([], list_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    lists
        .into_iter()
        .map(|mut list| {
            list.entry_ids = member_ids(conn, &SONG_LIST_SONGS, list.id)?;
            Ok(list)
        })
        .collect()
}

/// The list every operation here works on: the oldest one.
pub fn first_list(store: &Store) -> Result<Option<SongList>> {
    Ok(all_lists(store)?.into_iter().next())
}

/// Return the default list, creating it when absent.
pub fn ensure_list(store: &Store) -> Result<SongList> {
    if !store.is_connected() {
        return Err(StoreError::NotConnected);
    }

    if let Some(list) = first_list(store)? {
        return Ok(list);
    }

    let id = store.next_id(&SONG_LIST_SCHEMA)?;
    let now = Utc::now();
    store.with_transaction(|conn| {
        conn.execute(
            "INSERT INTO song_lists (id, name, created_at, modified_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, DEFAULT_LIST_NAME, now, now],
        )?;
        Ok(())
    })?;
    debug!(id, "created song list");

    Ok(SongList {
        id,
        name: DEFAULT_LIST_NAME.to_string(),
        created_at: now,
        modified_at: now,
        entry_ids: Vec::new(),
    })
}

/// Entries of the list sorted by index. Entries whose song is gone are left
/// out; they disappear for good on the next [`cleanup_orphans`].
pub fn entries(store: &Store) -> Result<Vec<SongListEntry>> {
    let Some(list) = first_list(store)? else {
        return Ok(Vec::new());
    };

    let mut entries = list_entries_in(store.conn()?, list.id)?;
    entries.retain(|entry| !entry.is_orphaned());
    Ok(entries)
}

/// The entry holding exactly `index`, if any.
pub fn entry_at(store: &Store, index: i64) -> Result<Option<SongListEntry>> {
    Ok(entries(store)?.into_iter().find(|entry| entry.index == index))
}

/// The entry just before `index`; `None` at the start of the list.
pub fn previous_of(store: &Store, index: i64) -> Result<Option<SongListEntry>> {
    match index.checked_sub(1) {
        Some(previous) if previous >= 0 => entry_at(store, previous),
        _ => Ok(None),
    }
}

/// The entry just after `index`; `None` at the end of the list.
pub fn next_of(store: &Store, index: i64) -> Result<Option<SongListEntry>> {
    match index.checked_add(1) {
        Some(next) => entry_at(store, next),
        None => Ok(None),
    }
}

/// Add `song` to the end of the list.
pub fn append(store: &Store, song: &Song) -> Outcome<SongListEntry> {
    Outcome::from_result(add_song(store, song), |_| {
        format!("Added {} to the song list", song.display_title())
    })
}

fn add_song(store: &Store, song: &Song) -> Result<SongListEntry> {
    if !store.is_connected() {
        warn!(song = %song.name, "Cannot add song: song database is not connected");
        return Err(StoreError::NotConnected);
    }

    if find_song_in(store.conn()?, song.id)?.is_none() {
        warn!(song = %song.name, id = song.id, "Cannot add song that is no longer stored");
        return Err(StoreError::not_found("song", &song.name));
    }

    let list = ensure_list(store)?;
    let entry_id = store.next_id(&SONG_LIST_SONG_SCHEMA)?;
    let index = list.entry_ids.len() as i64;

    store
        .with_transaction(|conn| {
            conn.execute(
                "INSERT INTO song_list_songs (id, list_index, song_id) VALUES (?1, ?2, ?3)",
                params![entry_id, index, song.id],
            )?;
            attach(conn, &SONG_LIST_SONGS, list.id, entry_id, index)?;
            touch(conn, list.id)
        })
        .inspect_err(|err| error!(song = %song.name, %err, "Failed to add song to song list"))?;

    prune_orphans(store)?;

    find_entry_in(store.conn()?, entry_id)?
        .ok_or_else(|| StoreError::not_found("song list entry", entry_id.to_string()))
}

/// Remove the entry whose index is `index`.
pub fn remove_at(store: &Store, index: i64) -> Outcome<()> {
    Outcome::from_result(remove_entry(store, index), |_| {
        format!("Removed song at index {index} from the song list")
    })
}

fn remove_entry(store: &Store, index: i64) -> Result<()> {
    if !store.is_connected() {
        return Err(StoreError::NotConnected);
    }

    let not_found = || StoreError::not_found("song at index", index.to_string());
    let list = first_list(store)?.ok_or_else(not_found)?;
    let entry = list_entries_in(store.conn()?, list.id)?
        .into_iter()
        .find(|entry| entry.index == index)
        .ok_or_else(|| {
            warn!(index, "No song list entry at index");
            not_found()
        })?;

    store
        .with_transaction(|conn| {
            delete_entry(conn, entry.id)?;
            touch(conn, list.id)
        })
        .inspect_err(|err| error!(index, %err, "Failed to remove song list entry"))?;

    prune_orphans(store)?;
    Ok(())
}

/// Drop entries whose song is gone and renumber the rest, for every stored
/// list. Running it twice changes nothing the second time.
pub fn cleanup_orphans(store: &Store) -> Outcome<usize> {
    Outcome::from_result(prune_orphans(store), |removed| {
        format!("Removed {removed} unavailable songs from the song list")
    })
}

pub(crate) fn prune_orphans(store: &Store) -> Result<usize> {
    if !store.is_connected() {
        return Err(StoreError::NotConnected);
    }

    let mut removed = 0;
    for list in all_lists(store)? {
        removed += store.with_transaction(|conn| {
            let mut removed = 0usize;
            for entry in list_entries_in(conn, list.id)? {
                if entry.is_orphaned() {
                    delete_entry(conn, entry.id)?;
                    removed += 1;
                }
            }
            reindex(conn, list.id)?;
            Ok(removed)
        })?;
    }

    if removed > 0 {
        debug!(removed, "pruned orphaned song list entries");
    }
    Ok(removed)
}

/// Remove every entry from the list.
pub fn clear(store: &Store) -> Outcome<usize> {
    Outcome::from_result(clear_entries(store), |count| {
        format!("Cleared {count} songs from the song list")
    })
}

fn clear_entries(store: &Store) -> Result<usize> {
    if !store.is_connected() {
        return Err(StoreError::NotConnected);
    }

    let Some(list) = first_list(store)? else {
        return Ok(0);
    };

    let count = store.with_transaction(|conn| {
        for entry_id in &list.entry_ids {
            delete_entry(conn, *entry_id)?;
        }
        touch(conn, list.id)?;
        Ok(list.entry_ids.len())
    })?;

    info!(count, "cleared song list");
    Ok(count)
}

/// Replace the verses selected for the entry at `index`. Verses not part of
/// the entry's song are ignored; the rest are kept in verse order.
pub fn save_selected_verses(store: &Store, index: i64, verse_ids: &[i64]) -> Outcome<usize> {
    Outcome::from_result(select_verses(store, index, verse_ids), |count| {
        format!("Saved {count} selected verses")
    })
}

fn select_verses(store: &Store, index: i64, verse_ids: &[i64]) -> Result<usize> {
    if !store.is_connected() {
        return Err(StoreError::NotConnected);
    }

    let entry = entry_at(store, index)?
        .ok_or_else(|| StoreError::not_found("song at index", index.to_string()))?;
    let Some(song_id) = entry.song_id else {
        return Err(StoreError::not_found("song at index", index.to_string()));
    };

    let conn = store.conn()?;
    let mut selected: Vec<(i64, i64)> = Vec::new();
    for verse_id in member_ids(conn, &SONG_VERSES, song_id)? {
        if verse_ids.contains(&verse_id) {
            let order_index: i64 = conn.query_row(
                "SELECT order_index FROM verses WHERE id = ?1",
                [verse_id],
                |row| row.get(0),
            )?;
            selected.push((order_index, verse_id));
        }
    }
    selected.sort();

    let first_id = store.next_id(&SONG_LIST_VERSE_SCHEMA)?;
    store.with_transaction(|conn| {
        delete_selected_verses(conn, entry.id)?;
        for (position, (_, verse_id)) in selected.iter().enumerate() {
            let id = first_id + position as i64;
            conn.execute(
                "INSERT INTO song_list_verses (id, verse_id) VALUES (?1, ?2)",
                params![id, verse_id],
            )?;
            attach(conn, &SONG_LIST_SONG_VERSES, entry.id, id, position as i64)?;
        }
        Ok(())
    })?;

    Ok(selected.len())
}

/// Point entries at `songs` wherever they currently refer to a different song
/// with the same uuid. Selected verses follow along by verse uuid. Returns
/// the number of entries moved.
pub(crate) fn replace_song(store: &Store, songs: &[Song]) -> Result<usize> {
    let lists = all_lists(store)?;

    store.with_transaction(|conn| {
        let mut moved = 0usize;
        for list in &lists {
            for entry in list_entries_in(conn, list.id)? {
                let Some(old_id) = entry.song_id else {
                    continue;
                };
                let Some(old) = find_song_in(conn, old_id)? else {
                    continue;
                };
                if old.uuid.is_empty() {
                    continue;
                }
                let Some(new) = songs
                    .iter()
                    .find(|song| song.uuid == old.uuid && song.id != old.id)
                else {
                    continue;
                };

                conn.execute(
                    "UPDATE song_list_songs SET song_id = ?1 WHERE id = ?2",
                    params![new.id, entry.id],
                )?;
                for selected_id in member_ids(conn, &SONG_LIST_SONG_VERSES, entry.id)? {
                    conn.execute(
                        "UPDATE song_list_verses SET verse_id = (
                             SELECT v.id FROM verses v
                             INNER JOIN song_verses m ON m.member_id = v.id
                             WHERE m.owner_id = ?1 AND v.uuid <> '' AND v.uuid = (
                                 SELECT uuid FROM verses WHERE id = song_list_verses.verse_id
                             )
                         )
                         WHERE id = ?2",
                        params![new.id, selected_id],
                    )?;
                }
                moved += 1;
            }
        }
        Ok(moved)
    })
}

/// All entries of `list_id` sorted by index, orphaned ones included.
fn list_entries_in(conn: &Connection, list_id: i64) -> Result<Vec<SongListEntry>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.list_index, e.song_id
         FROM song_list_songs e
         INNER JOIN song_list_entries m ON m.member_id = e.id
         WHERE m.owner_id = ?1
         ORDER BY e.list_index, e.id",
    )?;
    let entries = stmt
        .query_map([list_id], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    entries
        .into_iter()
        .map(|entry| with_selected_verses(conn, entry))
        .collect()
}

fn find_entry_in(conn: &Connection, entry_id: i64) -> Result<Option<SongListEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, list_index, song_id FROM song_list_songs WHERE id = ?1",
            [entry_id],
            entry_from_row,
        )
        .optional()?;

    entry.map(|entry| with_selected_verses(conn, entry)).transpose()
}

fn with_selected_verses(conn: &Connection, mut entry: SongListEntry) -> Result<SongListEntry> {
    let mut stmt = conn.prepare(
        "SELECT s.verse_id
         FROM song_list_verses s
         INNER JOIN song_list_selected_verses m ON m.member_id = s.id
         WHERE m.owner_id = ?1 AND s.verse_id IS NOT NULL
         ORDER BY m.position, s.id",
    )?;
    entry.selected_verse_ids = stmt
        .query_map([entry.id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(entry)
}

/// Renumber the entries of `list_id` to `0..n-1`, keeping their order.
fn reindex(conn: &Connection, list_id: i64) -> Result<()> {
    let entries = list_entries_in(conn, list_id)?;

    let mut update = conn.prepare("UPDATE song_list_songs SET list_index = ?1 WHERE id = ?2")?;
    for (position, entry) in entries.iter().enumerate() {
        if entry.index != position as i64 {
            update.execute(params![position as i64, entry.id])?;
        }
    }

    let ids: Vec<i64> = entries.iter().map(|entry| entry.id).collect();
    reorder(conn, &SONG_LIST_SONGS, list_id, &ids)
}

fn delete_entry(conn: &Connection, entry_id: i64) -> Result<()> {
    delete_selected_verses(conn, entry_id)?;
    conn.execute("DELETE FROM song_list_songs WHERE id = ?1", [entry_id])?;
    Ok(())
}

fn delete_selected_verses(conn: &Connection, entry_id: i64) -> Result<()> {
    for id in member_ids(conn, &SONG_LIST_SONG_VERSES, entry_id)? {
        conn.execute("DELETE FROM song_list_verses WHERE id = ?1", [id])?;
    }
    Ok(())
}

fn touch(conn: &Connection, list_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE song_lists SET modified_at = ?1 WHERE id = ?2",
        params![Utc::now(), list_id],
    )?;
    Ok(())
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<SongList> {
    Ok(SongList {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        modified_at: row.get(3)?,
        entry_ids: Vec::new(),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<SongListEntry> {
    Ok(SongListEntry {
        id: row.get(0)?,
        index: row.get(1)?,
        song_id: row.get(2)?,
        selected_verse_ids: Vec::new(),
    })
}

//! Read side of the song store: bundles, their songs and verses, and the
//! bundle a song belongs to.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::db::connection::Store;
use crate::db::schema::{member_ids, owner_of, SONG_BUNDLE_SONGS, SONG_VERSES};
use crate::error::{Result, StoreError};
use crate::models::{Song, SongBundle, Verse};

const BUNDLE_COLUMNS: &str = "id, abbreviation, name, language, author, copyright, uuid, hash, \
     size, created_at, modified_at";
const SONG_COLUMNS: &str =
    "id, name, number, author, copyright, language, uuid, created_at, modified_at";

/// Every stored bundle sorted by name, the order the download and search
/// screens present them in.
pub fn load_song_bundles(store: &Store) -> Result<Vec<SongBundle>> {
    if !store.is_connected() {
        warn!("Cannot load local song bundles: song database is not connected");
        return Err(StoreError::NotConnected);
    }

    query_bundles(
        store.conn()?,
        &format!("SELECT {BUNDLE_COLUMNS} FROM song_bundles ORDER BY name, id"),
        params![],
    )
}

/// The bundle with this id, with its song ids in stored order.
pub fn find_bundle(store: &Store, id: i64) -> Result<Option<SongBundle>> {
    find_bundle_in(store.conn()?, id)
}

pub(crate) fn find_bundle_in(conn: &Connection, id: i64) -> Result<Option<SongBundle>> {
    let bundle = conn
        .query_row(
            &format!("SELECT {BUNDLE_COLUMNS} FROM song_bundles WHERE id = ?1"),
            [id],
            bundle_from_row,
        )
        .optional()?;

    bundle
        .map(|mut bundle| {
            bundle.song_ids = member_ids(conn, &SONG_BUNDLE_SONGS, bundle.id)?;
            Ok(bundle)
        })
        .transpose()
}

/// Bundles with exactly this name. Imports use it to refuse duplicates.
pub fn find_bundles_by_name(store: &Store, name: &str) -> Result<Vec<SongBundle>> {
    query_bundles(
        store.conn()?,
        &format!("SELECT {BUNDLE_COLUMNS} FROM song_bundles WHERE name = ?1 ORDER BY id"),
        params![name],
    )
}

/// Bundles imported from the server record with this uuid.
pub fn find_bundles_by_uuid(store: &Store, uuid: &str) -> Result<Vec<SongBundle>> {
    query_bundles(
        store.conn()?,
        &format!("SELECT {BUNDLE_COLUMNS} FROM song_bundles WHERE uuid = ?1 ORDER BY id"),
        params![uuid],
    )
}

/// The song with this id, with its verse ids in stored order.
pub fn find_song(store: &Store, id: i64) -> Result<Option<Song>> {
    find_song_in(store.conn()?, id)
}

pub(crate) fn find_song_in(conn: &Connection, id: i64) -> Result<Option<Song>> {
    let song = conn
        .query_row(
            &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
            [id],
            song_from_row,
        )
        .optional()?;

    song.map(|mut song| {
        song.verse_ids = member_ids(conn, &SONG_VERSES, song.id)?;
        Ok(song)
    })
    .transpose()
}

/// Songs of `bundle` in stored order.
pub fn songs_of(store: &Store, bundle: &SongBundle) -> Result<Vec<Song>> {
    let conn = store.conn()?;
    let mut songs = Vec::new();
    for id in member_ids(conn, &SONG_BUNDLE_SONGS, bundle.id)? {
        if let Some(song) = find_song_in(conn, id)? {
            songs.push(song);
        }
    }
    Ok(songs)
}

/// Verses of `song` in stored order.
pub fn verses_of(store: &Store, song: &Song) -> Result<Vec<Verse>> {
    let conn = store.conn()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT v.id, v.name, v.content, v.language, v.order_index, v.uuid
         FROM verses v
         INNER JOIN {} m ON m.member_id = v.id
         WHERE m.owner_id = ?1
         ORDER BY m.position, v.id",
        SONG_VERSES.table
    ))?;

    let verses = stmt
        .query_map([song.id], |row| {
            Ok(Verse {
                id: row.get(0)?,
                name: row.get(1)?,
                content: row.get(2)?,
                language: row.get(3)?,
                order_index: row.get(4)?,
                uuid: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(verses)
}

/// The bundle a song belongs to, resolved through the bundle's song list.
pub fn bundle_of_song(store: &Store, song: &Song) -> Result<Option<SongBundle>> {
    let conn = store.conn()?;
    match owner_of(conn, &SONG_BUNDLE_SONGS, song.id)? {
        Some(bundle_id) => find_bundle_in(conn, bundle_id),
        None => Ok(None),
    }
}

fn query_bundles(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<SongBundle>> {
    let mut stmt = conn.prepare(sql)?;
    let bundles = stmt
        .query_map(params, bundle_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    bundles
        .into_iter()
        .map(|mut bundle| {
            bundle.song_ids = member_ids(conn, &SONG_BUNDLE_SONGS, bundle.id)?;
            Ok(bundle)
        })
        .collect()
}

fn bundle_from_row(row: &Row<'_>) -> rusqlite::Result<SongBundle> {
    Ok(SongBundle {
        id: row.get(0)?,
        abbreviation: row.get(1)?,
        name: row.get(2)?,
        language: row.get(3)?,
        author: row.get(4)?,
        copyright: row.get(5)?,
        uuid: row.get(6)?,
        hash: row.get(7)?,
        size: row.get(8)?,
        created_at: row.get(9)?,
        modified_at: row.get(10)?,
        song_ids: Vec::new(),
    })
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        name: row.get(1)?,
        number: row.get(2)?,
        author: row.get(3)?,
        copyright: row.get(4)?,
        language: row.get(5)?,
        uuid: row.get(6)?,
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
        verse_ids: Vec::new(),
    })
}

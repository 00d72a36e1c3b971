//! Turning server payloads into stored trees.
//!
//! Conversion is a pure pass over the payload that allocates local ids from
//! an [`IdCounters`] value threaded through the recursion. Only once the whole
//! tree converted cleanly is it written, inside a single transaction, so a
//! malformed timestamp or a storage failure leaves nothing behind.

use std::cmp::Ordering;

use rusqlite::{params, Connection};
use tracing::{debug, error, info, warn};

use crate::db::cascade;
use crate::db::connection::Store;
use crate::db::documents::{find_root_groups_by_name, find_root_groups_by_uuid};
use crate::db::schema::{
    attach, DOCUMENT_GROUP_GROUPS, DOCUMENT_GROUP_ITEMS, DOCUMENT_GROUP_SCHEMA, DOCUMENT_SCHEMA,
    SONG_BUNDLE_SCHEMA, SONG_BUNDLE_SONGS, SONG_SCHEMA, SONG_VERSES, VERSE_SCHEMA,
};
use crate::db::selection;
use crate::db::songs::{find_bundles_by_name, find_bundles_by_uuid};
use crate::error::{Result, StoreError};
use crate::models::{Document, DocumentGroup, Song, SongBundle, Verse};
use crate::outcome::Outcome;
use crate::remote::{
    parse_timestamp, RemoteDocument, RemoteDocumentGroup, RemoteSong, RemoteSongBundle,
    RemoteVerse,
};

/// Next free ids for one document import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCounters {
    pub group: i64,
    pub document: i64,
}

impl IdCounters {
    /// Seed both counters from what is already stored.
    pub fn seed(store: &Store) -> Result<Self> {
        Ok(Self {
            group: store.next_id(&DOCUMENT_GROUP_SCHEMA)?,
            document: store.next_id(&DOCUMENT_SCHEMA)?,
        })
    }
}

/// Next free ids for one song bundle import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongIdCounters {
    pub bundle: i64,
    pub song: i64,
    pub verse: i64,
}

impl SongIdCounters {
    pub fn seed(store: &Store) -> Result<Self> {
        Ok(Self {
            bundle: store.next_id(&SONG_BUNDLE_SCHEMA)?,
            song: store.next_id(&SONG_SCHEMA)?,
            verse: store.next_id(&VERSE_SCHEMA)?,
        })
    }
}

/// A converted document tree, flattened. Descendants come before their
/// parent, so the root is always the last group.
#[derive(Debug, Clone)]
pub struct ConvertedDocumentGroup {
    pub root_id: i64,
    pub groups: Vec<DocumentGroup>,
    pub documents: Vec<Document>,
}

impl ConvertedDocumentGroup {
    pub fn root(&self) -> Option<&DocumentGroup> {
        self.groups.iter().find(|group| group.id == self.root_id)
    }

    pub fn group(&self, id: i64) -> Option<&DocumentGroup> {
        self.groups.iter().find(|group| group.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct ConvertedSongBundle {
    pub bundle: SongBundle,
    pub songs: Vec<Song>,
    pub verses: Vec<Verse>,
}

/// Convert `remote` and all of its descendants into local records.
///
/// Child groups are sorted by name and converted first, then the group's own
/// documents in `index` order. A group takes its id only after every
/// descendant has taken theirs, and its `size` counts the documents of the
/// whole subtree.
pub fn convert_document_group(
    remote: &RemoteDocumentGroup,
    counters: &mut IdCounters,
    is_root: bool,
) -> Result<ConvertedDocumentGroup> {
    let mut converted = ConvertedDocumentGroup {
        root_id: 0,
        groups: Vec::new(),
        documents: Vec::new(),
    };
    converted.root_id = convert_group_into(remote, counters, is_root, &mut converted)?;
    Ok(converted)
}

fn convert_group_into(
    remote: &RemoteDocumentGroup,
    counters: &mut IdCounters,
    is_root: bool,
    out: &mut ConvertedDocumentGroup,
) -> Result<i64> {
    let mut children: Vec<&RemoteDocumentGroup> = remote.groups.iter().flatten().collect();
    children.sort_by(|a, b| compare_names(&a.name, &b.name));

    let mut size = 0;
    let mut group_ids = Vec::with_capacity(children.len());
    for child in children {
        let child_id = convert_group_into(child, counters, false, out)?;
        size += out.group(child_id).map_or(0, |group| group.size);
        group_ids.push(child_id);
    }

    let mut items: Vec<&RemoteDocument> = remote.items.iter().flatten().collect();
    items.sort_by_key(|item| item.index);

    let mut item_ids = Vec::with_capacity(items.len());
    for item in items {
        let document = convert_document(item, counters.document)?;
        counters.document += 1;
        item_ids.push(document.id);
        out.documents.push(document);
    }
    size += item_ids.len() as i64;

    let id = counters.group;
    counters.group += 1;

    out.groups.push(DocumentGroup {
        id,
        name: remote.name.clone(),
        language: remote.language.clone(),
        uuid: remote.uuid.clone(),
        hash: remote.hash.clone(),
        size,
        is_root,
        created_at: parse_timestamp(&remote.created_at)?,
        modified_at: parse_timestamp(&remote.modified_at)?,
        group_ids,
        item_ids,
    });

    Ok(id)
}

/// Sibling order for child groups. Names compare case-insensitively first;
/// when they differ only in case the lowercase spelling goes first, so
/// `alpha` < `Zeta` and `b` < `B`.
fn compare_names(a: &str, b: &str) -> Ordering {
    folded(a)
        .cmp(folded(b))
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .find(|(x, y)| x != y)
                .map_or(Ordering::Equal, |(x, y)| {
                    y.is_lowercase().cmp(&x.is_lowercase()).then(x.cmp(&y))
                })
        })
        .then_with(|| a.cmp(b))
}

fn folded(name: &str) -> impl Iterator<Item = char> + '_ {
    name.chars().flat_map(char::to_lowercase)
}

fn convert_document(remote: &RemoteDocument, id: i64) -> Result<Document> {
    Ok(Document {
        id,
        name: remote.name.clone(),
        content: remote.content.clone(),
        language: remote.language.clone(),
        uuid: remote.uuid.clone(),
        order_index: remote.index,
        created_at: parse_timestamp(&remote.created_at)?,
        modified_at: parse_timestamp(&remote.modified_at)?,
    })
}

/// Store a new document tree. Fails with `DuplicateName` when a root group
/// with the same name is already stored.
pub fn import_document_group(store: &Store, remote: &RemoteDocumentGroup) -> Outcome<usize> {
    Outcome::from_result(save_document_group(store, remote, false), |count| {
        format!("Imported {count} documents for {}", remote.name)
    })
}

/// Store a newer version of an already imported tree and then remove the
/// previous version(s), matched by uuid (or by name when the payload has no
/// uuid).
pub fn update_document_group(store: &Store, remote: &RemoteDocumentGroup) -> Outcome<usize> {
    Outcome::from_result(save_document_group(store, remote, true), |count| {
        format!("Updated {} with {count} documents", remote.name)
    })
}

fn save_document_group(
    store: &Store,
    remote: &RemoteDocumentGroup,
    replace_previous: bool,
) -> Result<usize> {
    if !store.is_connected() {
        warn!(group = %remote.name, "Cannot save document group: document database is not connected");
        return Err(StoreError::NotConnected);
    }

    if remote.is_empty() {
        warn!(group = %remote.name, "Document group is empty");
        return Err(StoreError::EmptyImport {
            kind: "Document group",
            name: remote.name.clone(),
        });
    }

    let previous = if !replace_previous {
        if !find_root_groups_by_name(store, &remote.name)?.is_empty() {
            warn!(group = %remote.name, "Document group already exists");
            return Err(StoreError::DuplicateName {
                kind: "Document group",
                name: remote.name.clone(),
            });
        }
        Vec::new()
    } else if remote.uuid.is_empty() {
        find_root_groups_by_name(store, &remote.name)?
    } else {
        find_root_groups_by_uuid(store, &remote.uuid)?
    };

    if replace_previous && previous.is_empty() {
        warn!(group = %remote.name, "Document group to update does not exist locally");
    }

    let mut counters = IdCounters::seed(store)?;
    debug!(group = counters.group, document = counters.document, "seeded document ids");

    let converted = convert_document_group(remote, &mut counters, true)?;
    let total = converted.documents.len();

    store
        .with_transaction(|conn| write_document_group(conn, &converted))
        .inspect_err(|err| error!(group = %remote.name, %err, "Failed to save document group"))?;

    info!(group = %remote.name, documents = total, "saved document group");

    for group in &previous {
        cascade::remove_document_group(store, group)?;
    }

    Ok(total)
}

fn write_document_group(conn: &Connection, converted: &ConvertedDocumentGroup) -> Result<()> {
    let mut insert_document = conn.prepare(
        "INSERT INTO documents (id, name, content, language, uuid, order_index, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for document in &converted.documents {
        insert_document.execute(params![
            document.id,
            document.name,
            document.content,
            document.language,
            document.uuid,
            document.order_index,
            document.created_at,
            document.modified_at,
        ])?;
    }

    let mut insert_group = conn.prepare(
        "INSERT INTO document_groups (id, name, language, uuid, hash, size, is_root, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for group in &converted.groups {
        insert_group.execute(params![
            group.id,
            group.name,
            group.language,
            group.uuid,
            group.hash,
            group.size,
            group.is_root,
            group.created_at,
            group.modified_at,
        ])?;
    }

    for group in &converted.groups {
        for (position, child_id) in group.group_ids.iter().enumerate() {
            attach(conn, &DOCUMENT_GROUP_GROUPS, group.id, *child_id, position as i64)?;
        }
        for (position, document_id) in group.item_ids.iter().enumerate() {
            attach(conn, &DOCUMENT_GROUP_ITEMS, group.id, *document_id, position as i64)?;
        }
    }

    Ok(())
}

/// Convert a bundle payload. Songs are ordered by their server id and verses
/// by `index`; each song takes its id after its verses.
pub fn convert_song_bundle(
    remote: &RemoteSongBundle,
    counters: &mut SongIdCounters,
) -> Result<ConvertedSongBundle> {
    let mut remote_songs: Vec<&RemoteSong> = remote.songs.iter().flatten().collect();
    remote_songs.sort_by_key(|song| song.id);

    let mut songs = Vec::with_capacity(remote_songs.len());
    let mut verses = Vec::new();
    for remote_song in remote_songs {
        let mut remote_verses: Vec<&RemoteVerse> = remote_song.verses.iter().flatten().collect();
        remote_verses.sort_by_key(|verse| verse.index);

        let mut verse_ids = Vec::with_capacity(remote_verses.len());
        for remote_verse in remote_verses {
            let id = counters.verse;
            counters.verse += 1;
            verse_ids.push(id);
            verses.push(Verse {
                id,
                name: remote_verse.name.clone(),
                content: remote_verse.content.clone(),
                language: remote_verse.language.clone(),
                order_index: remote_verse.index,
                uuid: remote_verse.uuid.clone(),
            });
        }

        let id = counters.song;
        counters.song += 1;
        songs.push(Song {
            id,
            name: remote_song.name.clone(),
            number: remote_song.number,
            author: remote_song.author.clone(),
            copyright: remote_song.copyright.clone(),
            language: remote_song.language.clone(),
            uuid: remote_song.uuid.clone(),
            created_at: parse_timestamp(&remote_song.created_at)?,
            modified_at: parse_timestamp(&remote_song.modified_at)?,
            verse_ids,
        });
    }

    let id = counters.bundle;
    counters.bundle += 1;
    let bundle = SongBundle {
        id,
        abbreviation: remote.abbreviation.clone(),
        name: remote.name.clone(),
        language: remote.language.clone(),
        author: remote.author.clone(),
        copyright: remote.copyright.clone(),
        uuid: remote.uuid.clone(),
        hash: remote.hash.clone(),
        size: songs.len() as i64,
        created_at: parse_timestamp(&remote.created_at)?,
        modified_at: parse_timestamp(&remote.modified_at)?,
        song_ids: songs.iter().map(|song| song.id).collect(),
    };

    Ok(ConvertedSongBundle {
        bundle,
        songs,
        verses,
    })
}

pub fn import_song_bundle(store: &Store, remote: &RemoteSongBundle) -> Outcome<usize> {
    Outcome::from_result(save_song_bundle(store, remote, false), |count| {
        format!("Imported {count} songs for {}", remote.name)
    })
}

/// Store a newer version of a bundle. Song list entries pointing at songs of
/// the previous version move over to the new songs with the same uuid before
/// the previous version is deleted.
pub fn update_song_bundle(store: &Store, remote: &RemoteSongBundle) -> Outcome<usize> {
    Outcome::from_result(save_song_bundle(store, remote, true), |count| {
        format!("Updated {} with {count} songs", remote.name)
    })
}

fn save_song_bundle(
    store: &Store,
    remote: &RemoteSongBundle,
    replace_previous: bool,
) -> Result<usize> {
    if !store.is_connected() {
        warn!(bundle = %remote.name, "Cannot save song bundle: song database is not connected");
        return Err(StoreError::NotConnected);
    }

    if remote.is_empty() {
        warn!(bundle = %remote.name, "Song bundle is empty");
        return Err(StoreError::EmptyImport {
            kind: "Song bundle",
            name: remote.name.clone(),
        });
    }

    let previous = if !replace_previous {
        if !find_bundles_by_name(store, &remote.name)?.is_empty() {
            warn!(bundle = %remote.name, "Song bundle already exists");
            return Err(StoreError::DuplicateName {
                kind: "Song bundle",
                name: remote.name.clone(),
            });
        }
        Vec::new()
    } else if remote.uuid.is_empty() {
        find_bundles_by_name(store, &remote.name)?
    } else {
        find_bundles_by_uuid(store, &remote.uuid)?
    };

    if replace_previous {
        match previous.len() {
            0 => warn!(bundle = %remote.name, "Song bundle to update does not exist locally"),
            1 => {}
            n => warn!(bundle = %remote.name, count = n, "Multiple local song bundles match the update"),
        }
    }

    let mut counters = SongIdCounters::seed(store)?;
    debug!(
        bundle = counters.bundle,
        song = counters.song,
        verse = counters.verse,
        "seeded song ids"
    );

    let converted = convert_song_bundle(remote, &mut counters)?;
    let total = converted.songs.len();

    store
        .with_transaction(|conn| write_song_bundle(conn, &converted))
        .inspect_err(|err| error!(bundle = %remote.name, %err, "Failed to save song bundle"))?;

    info!(bundle = %remote.name, songs = total, "saved song bundle");

    if !previous.is_empty() {
        let moved = selection::replace_song(store, &converted.songs)?;
        debug!(moved, "repointed song list entries");

        for bundle in &previous {
            cascade::remove_song_bundle(store, bundle)?;
        }
    }

    Ok(total)
}

fn write_song_bundle(conn: &Connection, converted: &ConvertedSongBundle) -> Result<()> {
    let mut insert_verse = conn.prepare(
        "INSERT INTO verses (id, name, content, language, order_index, uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for verse in &converted.verses {
        insert_verse.execute(params![
            verse.id,
            verse.name,
            verse.content,
            verse.language,
            verse.order_index,
            verse.uuid,
        ])?;
    }

    let mut insert_song = conn.prepare(
        "INSERT INTO songs (id, name, number, author, copyright, language, uuid, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for song in &converted.songs {
        insert_song.execute(params![
            song.id,
            song.name,
            song.number,
            song.author,
            song.copyright,
            song.language,
            song.uuid,
            song.created_at,
            song.modified_at,
        ])?;
        for (position, verse_id) in song.verse_ids.iter().enumerate() {
            attach(conn, &SONG_VERSES, song.id, *verse_id, position as i64)?;
        }
    }

    let bundle = &converted.bundle;
    conn.execute(
        "INSERT INTO song_bundles (id, abbreviation, name, language, author, copyright, uuid, hash, size, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            bundle.id,
            bundle.abbreviation,
            bundle.name,
            bundle.language,
            bundle.author,
            bundle.copyright,
            bundle.uuid,
            bundle.hash,
            bundle.size,
            bundle.created_at,
            bundle.modified_at,
        ],
    )?;
    for (position, song_id) in bundle.song_ids.iter().enumerate() {
        attach(conn, &SONG_BUNDLE_SONGS, bundle.id, *song_id, position as i64)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::StoreConfig;
    use crate::db::documents::{child_groups, documents_of, find_group, load_root_groups};
    use crate::db::songs::{find_song, load_song_bundles, verses_of};
    use tempfile::TempDir;

    const STAMP: &str = "2024-05-01T12:00:00Z";

    fn document(name: &str, index: i64) -> RemoteDocument {
        RemoteDocument {
            name: name.to_string(),
            content: format!("<p>{name}</p>"),
            language: "EN".to_string(),
            index,
            created_at: STAMP.to_string(),
            modified_at: STAMP.to_string(),
            ..Default::default()
        }
    }

    fn group(
        name: &str,
        groups: Vec<RemoteDocumentGroup>,
        items: Vec<RemoteDocument>,
    ) -> RemoteDocumentGroup {
        RemoteDocumentGroup {
            name: name.to_string(),
            language: "EN".to_string(),
            groups: Some(groups),
            items: Some(items),
            created_at: STAMP.to_string(),
            modified_at: STAMP.to_string(),
            uuid: format!("uuid-{name}"),
            ..Default::default()
        }
    }

    /// group 2 -> [group 2.2 -> [group 2.2.1 -> [doc]], group 2.1 -> [doc, doc]]
    /// with the children deliberately listed out of name order.
    fn group_two() -> RemoteDocumentGroup {
        group(
            "group 2",
            vec![
                group(
                    "group 2.2",
                    vec![group("group 2.2.1", vec![], vec![document("2.2.1 a", 0)])],
                    vec![],
                ),
                group(
                    "group 2.1",
                    vec![],
                    vec![document("2.1 b", 1), document("2.1 a", 0)],
                ),
            ],
            vec![],
        )
    }

    /// group 2 -> [doc, doc, group 2.1 (empty), group 2.2 -> [doc, group 2.2.1 -> [doc]]]
    fn nested_group_two() -> RemoteDocumentGroup {
        group(
            "group 2",
            vec![
                group(
                    "group 2.2",
                    vec![group("group 2.2.1", vec![], vec![document("2.2.1 a", 0)])],
                    vec![document("2.2 a", 0)],
                ),
                group("group 2.1", vec![], vec![]),
            ],
            vec![document("2 b", 1), document("2 a", 0)],
        )
    }

    fn song(id: i64, name: &str, uuid: &str) -> RemoteSong {
        RemoteSong {
            id,
            name: name.to_string(),
            number: Some(id),
            language: "EN".to_string(),
            verses: Some(vec![
                RemoteVerse {
                    name: "Verse 2".to_string(),
                    content: "second".to_string(),
                    language: "EN".to_string(),
                    index: 1,
                    uuid: format!("{uuid}-v2"),
                    ..Default::default()
                },
                RemoteVerse {
                    name: "Verse 1".to_string(),
                    content: "first".to_string(),
                    language: "EN".to_string(),
                    index: 0,
                    uuid: format!("{uuid}-v1"),
                    ..Default::default()
                },
            ]),
            created_at: STAMP.to_string(),
            modified_at: STAMP.to_string(),
            uuid: uuid.to_string(),
            ..Default::default()
        }
    }

    fn bundle(name: &str, songs: Vec<RemoteSong>) -> RemoteSongBundle {
        RemoteSongBundle {
            name: name.to_string(),
            abbreviation: name.chars().take(3).collect(),
            language: "EN".to_string(),
            songs: Some(songs),
            created_at: STAMP.to_string(),
            modified_at: STAMP.to_string(),
            uuid: format!("uuid-{name}"),
            ..Default::default()
        }
    }

    fn connected(config: StoreConfig) -> Store {
        let mut store = Store::new(config);
        store.connect().unwrap();
        store
    }

    #[test]
    fn conversion_assigns_ids_children_first() {
        let mut counters = IdCounters {
            group: 1,
            document: 1,
        };
        let converted = convert_document_group(&group_two(), &mut counters, true).unwrap();

        assert_eq!(counters, IdCounters { group: 5, document: 5 });
        assert_eq!(converted.root_id, 4);

        let root = converted.root().unwrap();
        assert!(root.is_root);
        assert_eq!(root.size, 3);
        assert_eq!(root.group_ids, vec![1, 3]);

        let first = converted.group(1).unwrap();
        assert_eq!(first.name, "group 2.1");
        assert_eq!(first.size, 2);
        assert!(!first.is_root);

        let second = converted.group(3).unwrap();
        assert_eq!(second.name, "group 2.2");
        assert_eq!(second.size, 1);
        assert_eq!(second.group_ids, vec![2]);
        assert_eq!(converted.group(2).unwrap().name, "group 2.2.1");

        let names: Vec<&str> = first
            .item_ids
            .iter()
            .filter_map(|id| converted.documents.iter().find(|d| d.id == *id))
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["2.1 a", "2.1 b"]);
    }

    #[test]
    fn own_documents_add_to_child_sizes_and_empty_children_count_zero() {
        let mut counters = IdCounters { group: 1, document: 1 };
        let converted = convert_document_group(&nested_group_two(), &mut counters, true).unwrap();

        assert_eq!(counters, IdCounters { group: 5, document: 5 });
        let size_of = |name: &str| {
            converted
                .groups
                .iter()
                .find(|group| group.name == name)
                .map(|group| group.size)
        };
        assert_eq!(size_of("group 2"), Some(4));
        assert_eq!(size_of("group 2.1"), Some(0));
        assert_eq!(size_of("group 2.2"), Some(2));
        assert_eq!(size_of("group 2.2.1"), Some(1));

        let root = converted.root().unwrap();
        assert_eq!(root.id, 4);
        assert_eq!(root.group_ids, vec![1, 3]);
        assert_eq!(root.item_ids, vec![3, 4]);
    }

    #[test]
    fn importing_nested_group_two_writes_four_documents() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));

        let outcome = import_document_group(&store, &nested_group_two());
        assert!(outcome.success, "{}", outcome.message());
        assert_eq!(outcome.data, Some(4));
        assert_eq!(store.next_id(&DOCUMENT_GROUP_SCHEMA).unwrap(), 5);
        assert_eq!(store.next_id(&DOCUMENT_SCHEMA).unwrap(), 5);

        let root = load_root_groups(&store).unwrap().remove(0);
        assert_eq!(root.size, 4);
        let sizes: Vec<(String, i64)> = child_groups(&store, &root)
            .unwrap()
            .into_iter()
            .map(|group| (group.name, group.size))
            .collect();
        assert_eq!(
            sizes,
            vec![("group 2.1".to_string(), 0), ("group 2.2".to_string(), 2)]
        );
    }

    #[test]
    fn child_groups_sort_case_insensitively_with_lowercase_first() {
        let remote = group(
            "root",
            vec![
                group("Zeta", vec![], vec![document("z", 0)]),
                group("B", vec![], vec![document("B", 0)]),
                group("alpha", vec![], vec![document("a", 0)]),
                group("b", vec![], vec![document("b", 0)]),
            ],
            vec![],
        );
        let mut counters = IdCounters { group: 1, document: 1 };
        let converted = convert_document_group(&remote, &mut counters, true).unwrap();

        let root = converted.root().unwrap();
        let names: Vec<&str> = root
            .group_ids
            .iter()
            .filter_map(|id| converted.group(*id))
            .map(|group| group.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "b", "B", "Zeta"]);
        assert_eq!(converted.group(1).unwrap().name, "alpha");
    }

    #[test]
    fn name_comparison_falls_back_to_exact_order() {
        assert_eq!(compare_names("alpha", "Zeta"), Ordering::Less);
        assert_eq!(compare_names("b", "B"), Ordering::Less);
        assert_eq!(compare_names("group 2.1", "group 2.2"), Ordering::Less);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn conversion_sums_sizes_over_the_whole_subtree() {
        let remote = group(
            "group 2",
            vec![
                group("a", vec![group("a.1", vec![], vec![document("x", 0)])], vec![document("y", 0)]),
                group("b", vec![], vec![document("z", 0), document("w", 1)]),
            ],
            vec![document("top", 0)],
        );
        let mut counters = IdCounters { group: 1, document: 1 };
        let converted = convert_document_group(&remote, &mut counters, true).unwrap();

        assert_eq!(converted.root().unwrap().size, 5);
        assert_eq!(converted.documents.len(), 5);
    }

    #[test]
    fn conversion_rejects_bad_timestamps() {
        let mut remote = group_two();
        remote.modified_at = "not a date".to_string();
        let mut counters = IdCounters { group: 1, document: 1 };

        let err = convert_document_group(&remote, &mut counters, true).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn import_writes_the_tree_and_links_it() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));

        let outcome = import_document_group(&store, &group_two());
        assert!(outcome.success, "{}", outcome.message());
        assert_eq!(outcome.data, Some(3));
        assert_eq!(store.count(&DOCUMENT_GROUP_SCHEMA).unwrap(), 4);
        assert_eq!(store.count(&DOCUMENT_SCHEMA).unwrap(), 3);

        let roots = load_root_groups(&store).unwrap();
        assert_eq!(roots.len(), 1);
        let children = child_groups(&store, &roots[0]).unwrap();
        let names: Vec<&str> = children.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["group 2.1", "group 2.2"]);

        let documents = documents_of(&store, &children[0]).unwrap();
        assert_eq!(documents[0].name, "2.1 a");
        assert_eq!(documents[1].name, "2.1 b");
    }

    #[test]
    fn second_import_continues_after_existing_ids() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));

        assert!(import_document_group(&store, &group_two()).success);
        let other = group("group 3", vec![], vec![document("only", 0)]);
        assert!(import_document_group(&store, &other).success);

        let root = load_root_groups(&store)
            .unwrap()
            .into_iter()
            .find(|g| g.name == "group 3")
            .unwrap();
        assert_eq!(root.id, 5);
        assert_eq!(root.item_ids, vec![4]);
    }

    #[test]
    fn import_refuses_duplicates_and_empty_payloads() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));

        assert!(import_document_group(&store, &group_two()).success);

        let duplicate = import_document_group(&store, &group_two());
        assert!(!duplicate.success);
        assert!(matches!(duplicate.error, Some(StoreError::DuplicateName { .. })));
        assert_eq!(store.count(&DOCUMENT_GROUP_SCHEMA).unwrap(), 4);

        let empty = import_document_group(&store, &group("hollow", vec![], vec![]));
        assert!(matches!(empty.error, Some(StoreError::EmptyImport { .. })));
        assert_eq!(empty.message(), "Document group hollow contains nothing to import");
    }

    #[test]
    fn import_requires_a_connection() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(StoreConfig::documents(dir.path()));

        let outcome = import_document_group(&store, &group_two());
        assert!(matches!(outcome.error, Some(StoreError::NotConnected)));
    }

    #[test]
    fn invalid_timestamp_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));

        let mut remote = group_two();
        if let Some(groups) = remote.groups.as_mut() {
            groups[0].created_at = "garbage".to_string();
        }

        let outcome = import_document_group(&store, &remote);
        assert!(matches!(outcome.error, Some(StoreError::InvalidTimestamp(_))));
        assert_eq!(store.count(&DOCUMENT_GROUP_SCHEMA).unwrap(), 0);
        assert_eq!(store.count(&DOCUMENT_SCHEMA).unwrap(), 0);
    }

    #[test]
    fn update_replaces_the_previous_tree() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::documents(dir.path()));
        assert!(import_document_group(&store, &group_two()).success);

        let newer = group("group 2", vec![], vec![document("fresh", 0)]);
        let outcome = update_document_group(&store, &newer);
        assert!(outcome.success, "{}", outcome.message());

        assert_eq!(store.count(&DOCUMENT_GROUP_SCHEMA).unwrap(), 1);
        assert_eq!(store.count(&DOCUMENT_SCHEMA).unwrap(), 1);
        let roots = load_root_groups(&store).unwrap();
        assert_eq!(roots[0].id, 5);
        assert!(find_group(&store, 4).unwrap().is_none());
    }

    #[test]
    fn bundle_conversion_orders_songs_and_verses() {
        let remote = bundle("Psalms", vec![song(20, "Second", "s2"), song(10, "First", "s1")]);
        let mut counters = SongIdCounters { bundle: 1, song: 1, verse: 1 };

        let converted = convert_song_bundle(&remote, &mut counters).unwrap();
        assert_eq!(counters, SongIdCounters { bundle: 2, song: 3, verse: 5 });
        assert_eq!(converted.bundle.size, 2);
        assert_eq!(converted.songs[0].name, "First");
        assert_eq!(converted.songs[0].verse_ids, vec![1, 2]);
        assert_eq!(converted.verses[0].name, "Verse 1");
        assert_eq!(converted.bundle.song_ids, vec![1, 2]);
    }

    #[test]
    fn import_song_bundle_stores_everything() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::songs(dir.path()));

        let outcome = import_song_bundle(&store, &bundle("Psalms", vec![song(1, "Psalm 1", "p1")]));
        assert!(outcome.success, "{}", outcome.message());
        assert_eq!(outcome.message(), "Imported 1 songs for Psalms");

        let bundles = load_song_bundles(&store).unwrap();
        assert_eq!(bundles[0].size, 1);
        let stored = find_song(&store, bundles[0].song_ids[0]).unwrap().unwrap();
        let verses = verses_of(&store, &stored).unwrap();
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0].content, "first");

        let again = import_song_bundle(&store, &bundle("Psalms", vec![song(1, "Psalm 1", "p1")]));
        assert!(matches!(again.error, Some(StoreError::DuplicateName { .. })));
    }

    #[test]
    fn update_song_bundle_keeps_selection_on_matching_songs() {
        let dir = TempDir::new().unwrap();
        let store = connected(StoreConfig::songs(dir.path()));
        assert!(import_song_bundle(&store, &bundle("Psalms", vec![song(1, "Psalm 1", "p1"), song(2, "Psalm 2", "p2")])).success);

        let first = find_song(&store, 1).unwrap().unwrap();
        let second = find_song(&store, 2).unwrap().unwrap();
        assert!(selection::append(&store, &first).success);
        assert!(selection::append(&store, &second).success);

        let outcome = update_song_bundle(&store, &bundle("Psalms", vec![song(1, "Psalm 1 (new)", "p1")]));
        assert!(outcome.success, "{}", outcome.message());

        let entries = selection::entries(&store).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 0);
        let moved = find_song(&store, entries[0].song_id.unwrap()).unwrap().unwrap();
        assert_eq!(moved.name, "Psalm 1 (new)");
        assert_eq!(load_song_bundles(&store).unwrap().len(), 1);
    }
}

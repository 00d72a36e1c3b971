use hymnbook_store::db::{self, cascade, import, selection};
use hymnbook_store::{RemoteDocumentGroup, RemoteSongBundle, Store, StoreConfig, StoreError};
use tempfile::TempDir;

const DOCUMENTS_JSON: &str = r#"{
    "name": "group 2",
    "language": "EN",
    "uuid": "group-2",
    "hash": "v1",
    "createdAt": "2024-02-01T08:00:00Z",
    "modifiedAt": "2024-02-01T08:00:00Z",
    "groups": [
        {
            "name": "group 2.2",
            "language": "EN",
            "createdAt": "2024-02-01T08:00:00Z",
            "modifiedAt": "2024-02-01T08:00:00Z",
            "groups": [
                {
                    "name": "group 2.2.1",
                    "language": "EN",
                    "createdAt": "2024-02-01T08:00:00Z",
                    "modifiedAt": "2024-02-01T08:00:00Z",
                    "items": [
                        {"name": "doc 3", "content": "c", "language": "EN", "index": 0,
                         "createdAt": "2024-02-01T08:00:00", "modifiedAt": "2024-02-01T08:00:00"}
                    ]
                }
            ]
        },
        {
            "name": "group 2.1",
            "language": "EN",
            "createdAt": "2024-02-01T08:00:00Z",
            "modifiedAt": "2024-02-01T08:00:00Z",
            "items": [
                {"name": "doc 2", "content": "b", "language": "EN", "index": 1,
                 "createdAt": "2024-02-01T08:00:00Z", "modifiedAt": "2024-02-01T08:00:00Z"},
                {"name": "doc 1", "content": "a", "language": "EN", "index": 0,
                 "createdAt": "2024-02-01T08:00:00Z", "modifiedAt": "2024-02-01T08:00:00Z"}
            ]
        }
    ]
}"#;

const SONGS_JSON: &str = r#"{
    "name": "Psalter",
    "abbreviation": "PS",
    "language": "EN",
    "uuid": "psalter",
    "hash": "v1",
    "createdAt": "2024-02-01T08:00:00Z",
    "modifiedAt": "2024-02-01T08:00:00Z",
    "songs": [
        {"id": 2, "name": "Psalm 2", "number": 2, "language": "EN", "uuid": "ps-2",
         "createdAt": "2024-02-01T08:00:00Z", "modifiedAt": "2024-02-01T08:00:00Z",
         "verses": [{"name": "1", "content": "Why do the nations rage", "language": "EN", "index": 0}]},
        {"id": 1, "name": "Psalm 1", "number": 1, "language": "EN", "uuid": "ps-1",
         "createdAt": "2024-02-01T08:00:00Z", "modifiedAt": "2024-02-01T08:00:00Z",
         "verses": [{"name": "1", "content": "Blessed is the man", "language": "EN", "index": 0}]}
    ]
}"#;

fn open(config: StoreConfig) -> Store {
    let mut store = Store::new(config);
    store.connect().unwrap();
    store
}

#[test]
fn document_tree_survives_reconnect_and_deletes_cleanly() {
    let dir = TempDir::new().unwrap();
    let remote = RemoteDocumentGroup::from_json(DOCUMENTS_JSON).unwrap();

    {
        let store = open(StoreConfig::documents(dir.path()));
        let outcome = import::import_document_group(&store, &remote);
        assert!(outcome.success, "{}", outcome.message());
        assert_eq!(outcome.data, Some(3));
    }

    let mut store = open(StoreConfig::documents(dir.path()));
    let root = db::load_root_groups(&store).unwrap().remove(0);
    assert_eq!(root.id, 4);
    assert_eq!(root.size, 3);
    assert_eq!(store.next_id(&db::DOCUMENT_GROUP_SCHEMA).unwrap(), 5);
    assert_eq!(store.next_id(&db::DOCUMENT_SCHEMA).unwrap(), 4);

    let children = db::child_groups(&store, &root).unwrap();
    assert_eq!(children[0].name, "group 2.1");
    let documents = db::documents_of(&store, &children[0]).unwrap();
    let parent = db::parent_of_document(&store, &documents[0]).unwrap().unwrap();
    assert_eq!(parent.id, children[0].id);

    let outcome = cascade::delete_document_group(&store, &root);
    assert_eq!(outcome.data.map(|s| (s.groups_deleted, s.documents_deleted)), Some((4, 3)));
    assert_eq!(store.count(&db::DOCUMENT_GROUP_SCHEMA).unwrap(), 0);
    assert_eq!(store.count(&db::DOCUMENT_SCHEMA).unwrap(), 0);

    let again = cascade::delete_document_group(&store, &root);
    assert!(matches!(again.error, Some(StoreError::NotFound { .. })));

    store.disconnect();
    assert!(!store.is_connected());
    assert!(matches!(
        db::load_root_groups(&store),
        Err(StoreError::NotConnected)
    ));
}

#[test]
fn song_list_follows_bundle_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut store = open(StoreConfig::songs(dir.path()));
    let remote = RemoteSongBundle::from_json(SONGS_JSON).unwrap();

    assert!(import::import_song_bundle(&store, &remote).success);
    let bundle = db::load_song_bundles(&store).unwrap().remove(0);
    let songs = db::songs_of(&store, &bundle).unwrap();
    assert_eq!(songs[0].name, "Psalm 1");
    assert_eq!(db::bundle_of_song(&store, &songs[1]).unwrap().unwrap().id, bundle.id);

    for song in &songs {
        assert!(selection::append(&store, song).success);
    }
    assert!(selection::append(&store, &songs[0]).success);
    assert!(selection::remove_at(&store, 0).success);

    let indices: Vec<i64> = selection::entries(&store)
        .unwrap()
        .iter()
        .map(|entry| entry.index)
        .collect();
    assert_eq!(indices, vec![0, 1]);

    let outcome = cascade::delete_song_bundle(&store, &bundle);
    assert_eq!(outcome.message(), "Deleted all 2 songs for Psalter");
    assert!(selection::entries(&store).unwrap().is_empty());
    assert_eq!(selection::cleanup_orphans(&store).data, Some(0));

    assert!(import::import_song_bundle(&store, &remote).success);
    let reset = cascade::delete_all(&mut store);
    assert!(reset.success, "{}", reset.message());
    assert!(db::load_song_bundles(&store).unwrap().is_empty());
    assert!(selection::entries(&store).unwrap().is_empty());
}

//! Declarative record schemas and the SQL that realises them.
//!
//! Every entity is one table with an integer `id` primary key. A list-of-X
//! relation owned by a record is stored in a membership table
//! `(owner_id, member_id UNIQUE, position)`: the owner reads its members in
//! `position` order, the member carries no parent column, and the `UNIQUE`
//! constraint keeps a record from being owned by two lists at once. Parent
//! lookups ("who owns me?") are back-reference queries on the same table.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Type of a declared field. Only the primary key's kind is checked at
/// runtime (by `Store::next_id`); the rest documents the table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    OptionalInt,
    Bool,
    Text,
    OptionalText,
    Date,
    /// Non-owning reference to a record of another schema. Nulled when the
    /// target is deleted.
    Reference(&'static str),
    /// Derived parent lookup through an owner's relation.
    BackReference {
        schema: &'static str,
        relation: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// An owned, ordered list of records of the `target` schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    /// Membership table holding `(owner_id, member_id, position)`.
    pub table: &'static str,
    pub target: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: Option<&'static str>,
    pub fields: &'static [Field],
    pub owned: &'static [Relation],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.owned.iter().find(|relation| relation.name == name)
    }
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

pub const DOCUMENT_GROUP_GROUPS: Relation = Relation {
    name: "groups",
    table: "document_group_groups",
    target: "DocumentGroup",
};

pub const DOCUMENT_GROUP_ITEMS: Relation = Relation {
    name: "items",
    table: "document_group_items",
    target: "Document",
};

pub const DOCUMENT_SCHEMA: Schema = Schema {
    name: "Document",
    table: "documents",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("name", FieldKind::Text),
        field("content", FieldKind::Text),
        field("language", FieldKind::Text),
        field("uuid", FieldKind::Text),
        field("order_index", FieldKind::Int),
        field("created_at", FieldKind::Date),
        field("modified_at", FieldKind::Date),
        field(
            "parent",
            FieldKind::BackReference {
                schema: "DocumentGroup",
                relation: "items",
            },
        ),
    ],
    owned: &[],
};

pub const DOCUMENT_GROUP_SCHEMA: Schema = Schema {
    name: "DocumentGroup",
    table: "document_groups",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("name", FieldKind::Text),
        field("language", FieldKind::Text),
        field("uuid", FieldKind::Text),
        field("hash", FieldKind::OptionalText),
        field("size", FieldKind::Int),
        field("is_root", FieldKind::Bool),
        field("created_at", FieldKind::Date),
        field("modified_at", FieldKind::Date),
    ],
    owned: &[DOCUMENT_GROUP_GROUPS, DOCUMENT_GROUP_ITEMS],
};

pub const SONG_BUNDLE_SONGS: Relation = Relation {
    name: "songs",
    table: "song_bundle_songs",
    target: "Song",
};

pub const SONG_VERSES: Relation = Relation {
    name: "verses",
    table: "song_verses",
    target: "Verse",
};

pub const SONG_LIST_SONGS: Relation = Relation {
    name: "songs",
    table: "song_list_entries",
    target: "SongListSong",
};

pub const SONG_LIST_SONG_VERSES: Relation = Relation {
    name: "selected_verses",
    table: "song_list_selected_verses",
    target: "SongListVerse",
};

pub const VERSE_SCHEMA: Schema = Schema {
    name: "Verse",
    table: "verses",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("name", FieldKind::Text),
        field("content", FieldKind::Text),
        field("language", FieldKind::Text),
        field("order_index", FieldKind::Int),
        field("uuid", FieldKind::Text),
        field(
            "song",
            FieldKind::BackReference {
                schema: "Song",
                relation: "verses",
            },
        ),
    ],
    owned: &[],
};

pub const SONG_SCHEMA: Schema = Schema {
    name: "Song",
    table: "songs",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("name", FieldKind::Text),
        field("number", FieldKind::OptionalInt),
        field("author", FieldKind::Text),
        field("copyright", FieldKind::Text),
        field("language", FieldKind::Text),
        field("uuid", FieldKind::Text),
        field("created_at", FieldKind::Date),
        field("modified_at", FieldKind::Date),
        field(
            "bundle",
            FieldKind::BackReference {
                schema: "SongBundle",
                relation: "songs",
            },
        ),
    ],
    owned: &[SONG_VERSES],
};

pub const SONG_BUNDLE_SCHEMA: Schema = Schema {
    name: "SongBundle",
    table: "song_bundles",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("abbreviation", FieldKind::Text),
        field("name", FieldKind::Text),
        field("language", FieldKind::Text),
        field("author", FieldKind::Text),
        field("copyright", FieldKind::Text),
        field("uuid", FieldKind::Text),
        field("hash", FieldKind::OptionalText),
        field("size", FieldKind::Int),
        field("created_at", FieldKind::Date),
        field("modified_at", FieldKind::Date),
    ],
    owned: &[SONG_BUNDLE_SONGS],
};

pub const SONG_LIST_VERSE_SCHEMA: Schema = Schema {
    name: "SongListVerse",
    table: "song_list_verses",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("verse_id", FieldKind::Reference("Verse")),
    ],
    owned: &[],
};

pub const SONG_LIST_SONG_SCHEMA: Schema = Schema {
    name: "SongListSong",
    table: "song_list_songs",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("list_index", FieldKind::Int),
        field("song_id", FieldKind::Reference("Song")),
    ],
    owned: &[SONG_LIST_SONG_VERSES],
};

pub const SONG_LIST_SCHEMA: Schema = Schema {
    name: "SongList",
    table: "song_lists",
    primary_key: Some("id"),
    fields: &[
        field("id", FieldKind::Int),
        field("name", FieldKind::Text),
        field("created_at", FieldKind::Date),
        field("modified_at", FieldKind::Date),
    ],
    owned: &[SONG_LIST_SONGS],
};

pub const DOCUMENT_SCHEMAS: &[Schema] = &[DOCUMENT_SCHEMA, DOCUMENT_GROUP_SCHEMA];

pub const SONG_SCHEMAS: &[Schema] = &[
    VERSE_SCHEMA,
    SONG_SCHEMA,
    SONG_BUNDLE_SCHEMA,
    SONG_LIST_VERSE_SCHEMA,
    SONG_LIST_SONG_SCHEMA,
    SONG_LIST_SCHEMA,
];

/// Bump together with any change to [`DOCUMENTS_DDL`].
pub const DOCUMENTS_SCHEMA_VERSION: i64 = 1;

/// Bump together with any change to [`SONGS_DDL`].
pub const SONGS_SCHEMA_VERSION: i64 = 1;

pub const DOCUMENTS_DDL: &str = "
CREATE TABLE IF NOT EXISTS document_groups (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    language TEXT NOT NULL,
    uuid TEXT NOT NULL DEFAULT '',
    hash TEXT,
    size INTEGER NOT NULL DEFAULT 0,
    is_root INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    language TEXT NOT NULL,
    uuid TEXT NOT NULL DEFAULT '',
    order_index INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_group_groups (
    owner_id INTEGER NOT NULL REFERENCES document_groups(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES document_groups(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS document_group_items (
    owner_id INTEGER NOT NULL REFERENCES document_groups(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES documents(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_group_groups_owner ON document_group_groups(owner_id);
CREATE INDEX IF NOT EXISTS idx_document_group_items_owner ON document_group_items(owner_id);
CREATE INDEX IF NOT EXISTS idx_document_groups_name ON document_groups(name);
";

pub const SONGS_DDL: &str = "
CREATE TABLE IF NOT EXISTS song_bundles (
    id INTEGER PRIMARY KEY,
    abbreviation TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    language TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT '',
    copyright TEXT NOT NULL DEFAULT '',
    uuid TEXT NOT NULL DEFAULT '',
    hash TEXT,
    size INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    number INTEGER,
    author TEXT NOT NULL DEFAULT '',
    copyright TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL,
    uuid TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS verses (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    language TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    uuid TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS song_bundle_songs (
    owner_id INTEGER NOT NULL REFERENCES song_bundles(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES songs(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS song_verses (
    owner_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES verses(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS song_lists (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS song_list_songs (
    id INTEGER PRIMARY KEY,
    list_index INTEGER NOT NULL,
    song_id INTEGER REFERENCES songs(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS song_list_verses (
    id INTEGER PRIMARY KEY,
    verse_id INTEGER REFERENCES verses(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS song_list_entries (
    owner_id INTEGER NOT NULL REFERENCES song_lists(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES song_list_songs(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS song_list_selected_verses (
    owner_id INTEGER NOT NULL REFERENCES song_list_songs(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL UNIQUE REFERENCES song_list_verses(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_song_bundle_songs_owner ON song_bundle_songs(owner_id);
CREATE INDEX IF NOT EXISTS idx_song_verses_owner ON song_verses(owner_id);
CREATE INDEX IF NOT EXISTS idx_song_list_entries_owner ON song_list_entries(owner_id);
CREATE INDEX IF NOT EXISTS idx_song_list_selected_verses_owner ON song_list_selected_verses(owner_id);
CREATE INDEX IF NOT EXISTS idx_songs_uuid ON songs(uuid);
";

/// Ordered ids of the records `owner_id` owns through `relation`.
pub fn member_ids(conn: &Connection, relation: &Relation, owner_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT member_id FROM {} WHERE owner_id = ?1 ORDER BY position, member_id",
        relation.table
    ))?;

    let ids = stmt
        .query_map([owner_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(ids)
}

/// Back-reference lookup: the owner listing `member_id` in `relation`, if any.
pub fn owner_of(conn: &Connection, relation: &Relation, member_id: i64) -> Result<Option<i64>> {
    let owner = conn
        .query_row(
            &format!(
                "SELECT owner_id FROM {} WHERE member_id = ?1",
                relation.table
            ),
            [member_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(owner)
}

/// Record that `owner_id` owns `member_id` at `position`. A member already
/// owned through this relation violates the `UNIQUE` constraint.
pub fn attach(
    conn: &Connection,
    relation: &Relation,
    owner_id: i64,
    member_id: i64,
    position: i64,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (owner_id, member_id, position) VALUES (?1, ?2, ?3)",
            relation.table
        ),
        params![owner_id, member_id, position],
    )?;
    Ok(())
}

/// Rewrite the positions of `owner_id`'s members to follow `member_ids`.
pub fn reorder(
    conn: &Connection,
    relation: &Relation,
    owner_id: i64,
    member_ids: &[i64],
) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "UPDATE {} SET position = ?1 WHERE owner_id = ?2 AND member_id = ?3",
        relation.table
    ))?;

    for (position, member_id) in member_ids.iter().enumerate() {
        stmt.execute(params![position as i64, owner_id, member_id])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_schema_declares_an_integer_primary_key() {
        for schema in DOCUMENT_SCHEMAS.iter().chain(SONG_SCHEMAS) {
            let key = schema.primary_key.expect("primary key");
            let field = schema.field(key).expect("primary key field");
            assert_eq!(field.kind, FieldKind::Int, "{}", schema.name);
        }
    }

    #[test]
    fn back_references_point_at_declared_relations() {
        let all: Vec<&Schema> = DOCUMENT_SCHEMAS.iter().chain(SONG_SCHEMAS).collect();

        for schema in &all {
            for field in schema.fields {
                if let FieldKind::BackReference {
                    schema: owner,
                    relation,
                } = field.kind
                {
                    let owner = all
                        .iter()
                        .find(|candidate| candidate.name == owner)
                        .expect("owner schema");
                    let relation = owner.relation(relation).expect("owning relation");
                    assert_eq!(relation.target, schema.name);
                }
            }
        }
    }

    #[test]
    fn membership_rows_enforce_single_owner() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(DOCUMENTS_DDL).unwrap();
        conn.execute_batch(
            "INSERT INTO document_groups (id, name, language, created_at, modified_at)
                 VALUES (1, 'a', 'EN', '', ''), (2, 'b', 'EN', '', '');
             INSERT INTO documents (id, name, content, language, order_index, created_at, modified_at)
                 VALUES (1, 'doc', '', 'EN', 0, '', '');",
        )
        .unwrap();

        attach(&conn, &DOCUMENT_GROUP_ITEMS, 1, 1, 0).unwrap();
        assert!(attach(&conn, &DOCUMENT_GROUP_ITEMS, 2, 1, 0).is_err());

        assert_eq!(owner_of(&conn, &DOCUMENT_GROUP_ITEMS, 1).unwrap(), Some(1));
        assert_eq!(member_ids(&conn, &DOCUMENT_GROUP_ITEMS, 1).unwrap(), vec![1]);
        assert_eq!(member_ids(&conn, &DOCUMENT_GROUP_ITEMS, 2).unwrap(), Vec::<i64>::new());
    }
}

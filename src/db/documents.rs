//! Read side of the document store: root groups for the overview, lookups
//! by id, name and uuid, and walking a tree in either direction. Nothing
//! here writes.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::db::connection::Store;
use crate::db::schema::{member_ids, owner_of, DOCUMENT_GROUP_GROUPS, DOCUMENT_GROUP_ITEMS};
use crate::error::{Result, StoreError};
use crate::models::{Document, DocumentGroup};

const GROUP_COLUMNS: &str =
    "id, name, language, uuid, hash, size, is_root, created_at, modified_at";
const DOCUMENT_COLUMNS: &str =
    "id, name, content, language, uuid, order_index, created_at, modified_at";

/// Every root group, sorted by name. This is what the document overview lists.
pub fn load_root_groups(store: &Store) -> Result<Vec<DocumentGroup>> {
    if !store.is_connected() {
        warn!("Cannot load local document groups: document database is not connected");
        return Err(StoreError::NotConnected);
    }

    query_groups(
        store.conn()?,
        &format!("SELECT {GROUP_COLUMNS} FROM document_groups WHERE is_root = 1 ORDER BY name, id"),
        params![],
    )
}

/// The group with this id, with its child and document ids filled in.
pub fn find_group(store: &Store, id: i64) -> Result<Option<DocumentGroup>> {
    find_group_in(store.conn()?, id)
}

pub(crate) fn find_group_in(conn: &Connection, id: i64) -> Result<Option<DocumentGroup>> {
    let group = conn
        .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM document_groups WHERE id = ?1"),
            [id],
            group_from_row,
        )
        .optional()?;

    group.map(|group| with_members(conn, group)).transpose()
}

/// Groups with exactly this name, at any depth.
pub fn find_groups_by_name(store: &Store, name: &str) -> Result<Vec<DocumentGroup>> {
    query_groups(
        store.conn()?,
        &format!("SELECT {GROUP_COLUMNS} FROM document_groups WHERE name = ?1 ORDER BY id"),
        params![name],
    )
}

/// Root groups with exactly this name. Imports use it to refuse duplicates.
pub fn find_root_groups_by_name(store: &Store, name: &str) -> Result<Vec<DocumentGroup>> {
    query_groups(
        store.conn()?,
        &format!(
            "SELECT {GROUP_COLUMNS} FROM document_groups
             WHERE name = ?1 AND is_root = 1 ORDER BY id"
        ),
        params![name],
    )
}

/// Root groups imported from the server record with this uuid.
pub fn find_root_groups_by_uuid(store: &Store, uuid: &str) -> Result<Vec<DocumentGroup>> {
    query_groups(
        store.conn()?,
        &format!(
            "SELECT {GROUP_COLUMNS} FROM document_groups
             WHERE uuid = ?1 AND is_root = 1 ORDER BY id"
        ),
        params![uuid],
    )
}

/// Owned child groups of `group`, in stored order.
pub fn child_groups(store: &Store, group: &DocumentGroup) -> Result<Vec<DocumentGroup>> {
    let conn = store.conn()?;
    let mut groups = Vec::with_capacity(group.group_ids.len());
    for id in member_ids(conn, &DOCUMENT_GROUP_GROUPS, group.id)? {
        if let Some(child) = find_group_in(conn, id)? {
            groups.push(child);
        }
    }
    Ok(groups)
}

/// Documents owned by `group`, in stored order.
pub fn documents_of(store: &Store, group: &DocumentGroup) -> Result<Vec<Document>> {
    let conn = store.conn()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT d.id, d.name, d.content, d.language, d.uuid, d.order_index, d.created_at, d.modified_at
         FROM documents d
         INNER JOIN {} m ON m.member_id = d.id
         WHERE m.owner_id = ?1
         ORDER BY m.position, d.id",
        DOCUMENT_GROUP_ITEMS.table
    ))?;

    let documents = stmt
        .query_map([group.id], document_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(documents)
}

/// The document with this id.
pub fn find_document(store: &Store, id: i64) -> Result<Option<Document>> {
    let document = store
        .conn()?
        .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            [id],
            document_from_row,
        )
        .optional()?;
    Ok(document)
}

/// The group owning `document`, found through the back-reference on the
/// group's item list.
pub fn parent_of_document(store: &Store, document: &Document) -> Result<Option<DocumentGroup>> {
    let conn = store.conn()?;
    match owner_of(conn, &DOCUMENT_GROUP_ITEMS, document.id)? {
        Some(owner_id) => find_group_in(conn, owner_id),
        None => Ok(None),
    }
}

fn query_groups(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<DocumentGroup>> {
    let mut stmt = conn.prepare(sql)?;
    let groups = stmt
        .query_map(params, group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    groups
        .into_iter()
        .map(|group| with_members(conn, group))
        .collect()
}

fn with_members(conn: &Connection, mut group: DocumentGroup) -> Result<DocumentGroup> {
    group.group_ids = member_ids(conn, &DOCUMENT_GROUP_GROUPS, group.id)?;
    group.item_ids = member_ids(conn, &DOCUMENT_GROUP_ITEMS, group.id)?;
    Ok(group)
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentGroup> {
    Ok(DocumentGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        language: row.get(2)?,
        uuid: row.get(3)?,
        hash: row.get(4)?,
        size: row.get(5)?,
        is_root: row.get(6)?,
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
        group_ids: Vec::new(),
        item_ids: Vec::new(),
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        language: row.get(3)?,
        uuid: row.get(4)?,
        order_index: row.get(5)?,
        created_at: row.get(6)?,
        modified_at: row.get(7)?,
    })
}

//! Opening, migrating and closing the embedded SQLite stores, plus the
//! primitives every component builds on: id allocation and transactions.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::schema::{
    FieldKind, Schema, DOCUMENTS_DDL, DOCUMENTS_SCHEMA_VERSION, DOCUMENT_SCHEMAS, SONGS_DDL,
    SONGS_SCHEMA_VERSION, SONG_SCHEMAS,
};
use crate::error::{Result, StoreError};

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".hymnbook";
/// SQLite file holding document groups and documents.
const DOCUMENTS_FILE_NAME: &str = "hymnbook_documents.sqlite";
/// SQLite file holding song bundles, songs, and the song selection list.
const SONGS_FILE_NAME: &str = "hymnbook_songs.sqlite";

/// Everything needed to open one logical store: where it lives and which
/// schema set it carries.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Human-readable name used in log lines and reset messages.
    pub label: &'static str,
    /// Location of the SQLite file.
    pub path: PathBuf,
    /// Record schemas stored in this file; `next_id` checks against them.
    pub schemas: &'static [Schema],
    /// Value `PRAGMA user_version` is brought up to on connect.
    pub schema_version: i64,
    /// Table definitions applied when the file is older than `schema_version`.
    pub ddl: &'static str,
}

impl StoreConfig {
    /// Document groups and documents, stored in `data_dir`.
    pub fn documents(data_dir: &Path) -> Self {
        Self {
            label: "documents",
            path: data_dir.join(DOCUMENTS_FILE_NAME),
            schemas: DOCUMENT_SCHEMAS,
            schema_version: DOCUMENTS_SCHEMA_VERSION,
            ddl: DOCUMENTS_DDL,
        }
    }

    /// Song bundles, songs, verses and the song list, stored in `data_dir`.
    pub fn songs(data_dir: &Path) -> Self {
        Self {
            label: "songs",
            path: data_dir.join(SONGS_FILE_NAME),
            schemas: SONG_SCHEMAS,
            schema_version: SONGS_SCHEMA_VERSION,
            ddl: SONGS_DDL,
        }
    }
}

/// Resolve the application data directory inside the user's home.
pub fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| StoreError::Connection {
        path: PathBuf::from("~"),
        reason: "could not locate home directory".to_string(),
    })?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

/// Handle on one embedded store. Holds at most one live connection; all
/// reads and writes borrow it through [`Store::conn`] or
/// [`Store::with_transaction`].
pub struct Store {
    config: StoreConfig,
    conn: Option<Connection>,
    connected: Cell<bool>,
}

impl Store {
    /// A disconnected handle; call [`Store::connect`] before use.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            conn: None,
            connected: Cell::new(false),
        }
    }

    /// The configuration this handle was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open (or create) the store file and bring its tables up to the
    /// configured schema version. An already connected handle is closed and
    /// reopened.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!(store = self.config.label, "reconnecting");
            self.disconnect();
        }

        let conn = open_and_migrate(&self.config)?;
        self.conn = Some(conn);
        self.connected.set(true);

        info!(
            store = self.config.label,
            path = %self.config.path.display(),
            "connected"
        );
        Ok(())
    }

    /// Release the connection. Does nothing when not connected.
    pub fn disconnect(&mut self) {
        self.connected.set(false);
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!(store = self.config.label, error = %err, "close failed");
            }
        }
    }

    /// Whether a connection is live. A stale flag left behind by a vanished
    /// handle is reset here.
    pub fn is_connected(&self) -> bool {
        if self.conn.is_none() {
            self.connected.set(false);
        }
        self.connected.get()
    }

    /// Borrow the live connection.
    pub fn conn(&self) -> Result<&Connection> {
        match (&self.conn, self.is_connected()) {
            (Some(conn), true) => Ok(conn),
            _ => Err(StoreError::NotConnected),
        }
    }

    /// Next free primary key for `schema`: one past the current maximum, or
    /// `1` for an empty table. Call it once per insert batch and count up
    /// locally from there.
    pub fn next_id(&self, schema: &Schema) -> Result<i64> {
        let key = schema.primary_key.ok_or_else(|| {
            StoreError::Schema(format!(
                "Schema {} doesn't have a primary key specified",
                schema.name
            ))
        })?;

        match schema.field(key).map(|field| field.kind) {
            Some(FieldKind::Int) => {}
            other => {
                return Err(StoreError::Schema(format!(
                    "Primary key of schema {} must be an integer instead of: '{:?}'",
                    schema.name, other
                )))
            }
        }

        let conn = self.conn()?;
        let max: Option<i64> = conn.query_row(
            &format!("SELECT MAX({key}) FROM {}", schema.table),
            [],
            |row| row.get(0),
        )?;

        Ok(max.map_or(1, |max| max + 1))
    }

    /// Run `body` inside one write transaction. The transaction commits when
    /// `body` returns `Ok` and rolls back on `Err` or unwinding.
    pub fn with_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn()?.unchecked_transaction()?;
        let value = body(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Number of stored records of `schema`.
    pub fn count(&self, schema: &Schema) -> Result<i64> {
        let count = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", schema.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Close the handle and remove the store file from disk.
    pub fn delete_file(&mut self) -> Result<()> {
        self.disconnect();

        info!(store = self.config.label, "deleting database");
        match fs::remove_file(&self.config.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn open_and_migrate(config: &StoreConfig) -> Result<Connection> {
    let connection_error = |reason: String| StoreError::Connection {
        path: config.path.clone(),
        reason,
    };

    if let Some(parent) = config.path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| connection_error(format!("failed to create data directory: {err}")))?;
    }

    let conn = Connection::open(&config.path)
        .map_err(|err| connection_error(format!("failed to open SQLite database: {err}")))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| connection_error(format!("failed to enable foreign keys: {err}")))?;

    let current: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|err| connection_error(format!("failed to read schema version: {err}")))?;

    if current > config.schema_version {
        return Err(connection_error(format!(
            "unsupported schema version {current}, max supported {}",
            config.schema_version
        )));
    }

    if current < config.schema_version {
        debug!(
            store = config.label,
            from = current,
            to = config.schema_version,
            "applying schema"
        );
        conn.execute_batch(config.ddl)
            .and_then(|_| {
                conn.execute_batch(&format!(
                    "PRAGMA user_version = {};",
                    config.schema_version
                ))
            })
            .map_err(|err| connection_error(format!("failed to apply schema: {err}")))?;
    }

    Ok(conn)
}

//! SQLite reference adapter.
//!
//! Document data is stored as JSON text; list filters and sorts go through
//! SQLite's JSON1 functions. One connection serves every caller: it sits
//! behind a `std::sync::Mutex`. An async read/write gate keeps an open
//! transaction exclusive: plain reads share the gate and wait until the
//! transaction commits or rolls back, while reads issued through the
//! transaction itself see its own writes.

use crate::adapter::{
    FindQuery, RootData, RowTable, Sort, StorageAdapter, StoredDocument, Transaction, VersionRow,
};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use folio_model::{BlockIdent, Data, DocumentStatus, FieldPath, PathSegment, RelationRecord, TreeBlock};
use folio_types::{DocumentId, Locale, RowId, VersionId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        data TEXT NOT NULL,
        status TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE TABLE IF NOT EXISTS document_locales (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        locale TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (collection, id, locale)
    );

    CREATE TABLE IF NOT EXISTS relations (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        parent_id TEXT NOT NULL,
        path TEXT NOT NULL,
        position INTEGER NOT NULL,
        relation_to TEXT NOT NULL,
        relation_id TEXT NOT NULL,
        locale TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_relations_parent ON relations(collection, parent_id);

    CREATE TABLE IF NOT EXISTS blocks (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        parent_id TEXT NOT NULL,
        path TEXT NOT NULL,
        position INTEGER NOT NULL,
        block_type TEXT,
        locale TEXT,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(collection, parent_id);

    CREATE TABLE IF NOT EXISTS tree_blocks (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        parent_id TEXT NOT NULL,
        path TEXT NOT NULL,
        position INTEGER NOT NULL,
        block_type TEXT,
        locale TEXT,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tree_blocks_parent ON tree_blocks(collection, parent_id);

    CREATE TABLE IF NOT EXISTS versions (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        parent_id TEXT NOT NULL,
        status TEXT NOT NULL,
        locale TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_versions_parent ON versions(collection, parent_id);
";

/// Storage adapter backed by a single SQLite connection.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    gate: Arc<RwLock<()>>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file.
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened document store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(RwLock::new(())),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Runs a plain read. Reads wait while a transaction is open, so they
    /// only ever see committed data.
    async fn read<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let _shared = self.gate.read().await;
        with_conn(&self.conn, f)
    }

    fn init_schema(&self) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }
}

fn with_conn<T>(
    conn: &Mutex<Connection>,
    f: impl FnOnce(&Connection) -> StorageResult<T>,
) -> StorageResult<T> {
    let guard = conn.lock().map_err(|e| StorageError::Lock(e.to_string()))?;
    f(&guard)
}

// ── Encoding ─────────────────────────────────────────────────────

fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("invalid timestamp '{raw}': {e}")))
}

fn decode_data(raw: &str) -> StorageResult<Data> {
    Ok(serde_json::from_str(raw)?)
}

fn decode_document_id(raw: &str) -> StorageResult<DocumentId> {
    DocumentId::parse(raw).map_err(|e| StorageError::InvalidData(format!("invalid document id '{raw}': {e}")))
}

fn decode_row_id(raw: &str) -> StorageResult<RowId> {
    RowId::parse(raw).map_err(|e| StorageError::InvalidData(format!("invalid row id '{raw}': {e}")))
}

fn decode_version_id(raw: &str) -> StorageResult<VersionId> {
    VersionId::parse(raw).map_err(|e| StorageError::InvalidData(format!("invalid version id '{raw}': {e}")))
}

fn decode_path(raw: &str) -> StorageResult<FieldPath> {
    raw.parse()
        .map_err(|e| StorageError::InvalidData(format!("invalid path '{raw}': {e}")))
}

fn decode_status(raw: &str) -> StorageResult<DocumentStatus> {
    DocumentStatus::parse(raw).ok_or_else(|| StorageError::InvalidData(format!("invalid status '{raw}'")))
}

/// JSON1 path for a field path, e.g. `$."meta"."title"` or `$."items"[0]`.
fn json_path(path: &FieldPath) -> String {
    let mut out = String::from("$");
    for segment in path.segments() {
        match segment {
            PathSegment::Key(key) => out.push_str(&format!(".\"{}\"", key.replace('"', ""))),
            PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
        }
    }
    out
}

/// The SQL value `json_extract` yields for a JSON value.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ── Queries ──────────────────────────────────────────────────────

type RootRow = (String, String, Option<String>, String, String);

fn load_locales(conn: &Connection, collection: &str, id: &str) -> StorageResult<BTreeMap<Locale, Data>> {
    let mut stmt = conn.prepare(
        "SELECT locale, data FROM document_locales WHERE collection = ?1 AND id = ?2",
    )?;
    let rows = stmt.query_map(params![collection, id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (locale, data) = row?;
        out.insert(Locale::new(locale), decode_data(&data)?);
    }
    Ok(out)
}

fn decode_root(conn: &Connection, collection: &str, row: RootRow) -> StorageResult<StoredDocument> {
    let (id, data, status, created_at, updated_at) = row;
    Ok(StoredDocument {
        id: decode_document_id(&id)?,
        collection: collection.to_string(),
        shared: decode_data(&data)?,
        localized: load_locales(conn, collection, &id)?,
        status: status.as_deref().map(decode_status).transpose()?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

/// Builds the `WHERE` clause and parameters shared by find and count.
fn where_clause(collection: &str, query: &FindQuery) -> (String, Vec<SqlValue>) {
    let mut sql = String::from(
        " FROM documents d \
         LEFT JOIN document_locales l \
           ON l.collection = d.collection AND l.id = d.id AND l.locale = ?2 \
         WHERE d.collection = ?1",
    );
    let mut values = vec![
        SqlValue::Text(collection.to_string()),
        match &query.locale {
            Some(locale) => SqlValue::Text(locale.to_string()),
            None => SqlValue::Null,
        },
    ];
    for (path, value) in &query.conditions {
        let column = if path.to_string() == "id" {
            "d.id".to_string()
        } else {
            values.push(SqlValue::Text(json_path(path)));
            let n = values.len();
            format!("COALESCE(json_extract(l.data, ?{n}), json_extract(d.data, ?{n}))")
        };
        if value.is_null() {
            sql.push_str(&format!(" AND {column} IS NULL"));
        } else {
            values.push(sql_value(value));
            sql.push_str(&format!(" AND {column} = ?{}", values.len()));
        }
    }
    (sql, values)
}

fn order_clause(sort: Option<&Sort>, values: &mut Vec<SqlValue>) -> String {
    let Some(sort) = sort else {
        return " ORDER BY d.created_at DESC, d.id DESC".to_string();
    };
    let direction = if sort.descending { "DESC" } else { "ASC" };
    let column = match sort.field.as_str() {
        "id" => "d.id".to_string(),
        "createdAt" => "d.created_at".to_string(),
        "updatedAt" => "d.updated_at".to_string(),
        field => match field.parse::<FieldPath>() {
            Ok(path) => {
                values.push(SqlValue::Text(json_path(&path)));
                let n = values.len();
                format!("COALESCE(json_extract(l.data, ?{n}), json_extract(d.data, ?{n}))")
            }
            Err(_) => {
                warn!("Ignoring unparsable sort field '{}'", field);
                "d.created_at".to_string()
            }
        },
    };
    format!(" ORDER BY {column} {direction}, d.id {direction}")
}

type VersionRaw = (String, String, String, String, String, String, String);

fn version_from_row(collection: &str, row: VersionRaw) -> StorageResult<VersionRow> {
    let (id, parent_id, status, locale, data, created_at, updated_at) = row;
    Ok(VersionRow {
        id: decode_version_id(&id)?,
        collection: collection.to_string(),
        parent_id: decode_document_id(&parent_id)?,
        status: decode_status(&status)?,
        locale: Locale::new(locale),
        data: decode_data(&data)?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

const VERSION_COLUMNS: &str = "id, parent_id, status, locale, data, created_at, updated_at";

fn read_version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn query_relations(
    conn: &Connection,
    collection: &str,
    parent_id: DocumentId,
) -> StorageResult<Vec<RelationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, position, relation_to, relation_id, locale FROM relations \
         WHERE collection = ?1 AND parent_id = ?2 ORDER BY path, position",
    )?;
    let rows = stmt.query_map(params![collection, parent_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, path, position, relation_to, relation_id, locale) = row?;
        out.push(RelationRecord {
            id: Some(decode_row_id(&id)?),
            path: decode_path(&path)?,
            position: position as usize,
            relation_to,
            relation_id: decode_document_id(&relation_id)?,
            locale: locale.map(Locale::new),
        });
    }
    Ok(out)
}

fn query_rows(
    conn: &Connection,
    table: RowTable,
    collection: &str,
    parent_id: DocumentId,
) -> StorageResult<Vec<TreeBlock>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, path, position, block_type, locale, data FROM {table} \
         WHERE collection = ?1 AND parent_id = ?2 ORDER BY path, position"
    ))?;
    let rows = stmt.query_map(params![collection, parent_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, path, position, block_type, locale, data) = row?;
        out.push(TreeBlock {
            id: Some(BlockIdent::Stable(decode_row_id(&id)?)),
            path: decode_path(&path)?,
            position: position as usize,
            block_type,
            locale: locale.map(Locale::new),
            data: decode_data(&data)?,
        });
    }
    Ok(out)
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StorageResult<Option<StoredDocument>> {
        self.read(|conn| {
            let row: Option<RootRow> = conn
                .query_row(
                    "SELECT id, data, status, created_at, updated_at FROM documents \
                     WHERE collection = ?1 AND id = ?2",
                    params![collection, id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()?;
            row.map(|row| decode_root(conn, collection, row)).transpose()
        })
        .await
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> StorageResult<Vec<StoredDocument>> {
        self.read(|conn| {
            let (from, mut values) = where_clause(collection, query);
            let order = order_clause(query.sort.as_ref(), &mut values);
            let limit = query.limit.map_or(-1, |l| l as i64);
            let sql = format!(
                "SELECT d.id, d.data, d.status, d.created_at, d.updated_at{from}{order} LIMIT {limit} OFFSET {}",
                query.offset
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode_root(conn, collection, row?)?);
            }
            debug!("find '{}' returned {} document(s)", collection, out.len());
            Ok(out)
        })
        .await
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> StorageResult<usize> {
        self.read(|conn| {
            let (from, values) = where_clause(collection, query);
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*){from}"),
                params_from_iter(values),
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn relations(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<RelationRecord>> {
        self.read(|conn| query_relations(conn, collection, parent_id)).await
    }

    async fn rows(&self, table: RowTable, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<TreeBlock>> {
        self.read(|conn| query_rows(conn, table, collection, parent_id)).await
    }

    async fn version(&self, collection: &str, id: VersionId) -> StorageResult<Option<VersionRow>> {
        self.read(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE collection = ?1 AND id = ?2"),
                    params![collection, id.to_string()],
                    read_version_row,
                )
                .optional()?;
            row.map(|row| version_from_row(collection, row)).transpose()
        })
        .await
    }

    async fn latest_version(
        &self,
        collection: &str,
        parent_id: DocumentId,
        locale: &Locale,
        status: Option<DocumentStatus>,
    ) -> StorageResult<Option<VersionRow>> {
        self.read(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {VERSION_COLUMNS} FROM versions \
                         WHERE collection = ?1 AND parent_id = ?2 AND locale = ?3 \
                           AND (?4 IS NULL OR status = ?4) \
                         ORDER BY updated_at DESC, id DESC LIMIT 1"
                    ),
                    params![
                        collection,
                        parent_id.to_string(),
                        locale.as_str(),
                        status.map(DocumentStatus::as_str)
                    ],
                    read_version_row,
                )
                .optional()?;
            row.map(|row| version_from_row(collection, row)).transpose()
        })
        .await
    }

    async fn versions(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<VersionRow>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions WHERE collection = ?1 AND parent_id = ?2 \
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![collection, parent_id.to_string()], read_version_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(version_from_row(collection, row?)?);
            }
            Ok(out)
        })
        .await
    }

    async fn begin(&self) -> StorageResult<Box<dyn Transaction>> {
        let gate = Arc::clone(&self.gate).write_owned().await;
        with_conn(&self.conn, |conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            Ok(())
        })?;
        debug!("Transaction opened");
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            open: AtomicBool::new(true),
            _gate: gate,
        }))
    }
}

/// An open SQLite transaction. Rolls back on drop unless committed.
pub struct SqliteTransaction {
    conn: Arc<Mutex<Connection>>,
    open: AtomicBool,
    _gate: OwnedRwLockWriteGuard<()>,
}

impl SqliteTransaction {
    fn insert_root(
        &self,
        conn: &Connection,
        collection: &str,
        id: DocumentId,
        root: &RootData,
        upsert: bool,
    ) -> StorageResult<()> {
        let now = encode_time(Utc::now());
        let conflict = if upsert {
            " ON CONFLICT(collection, id) DO UPDATE SET \
               data = excluded.data, status = excluded.status, updated_at = excluded.updated_at"
        } else {
            ""
        };
        conn.execute(
            &format!(
                "INSERT INTO documents (collection, id, data, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5){conflict}"
            ),
            params![
                collection,
                id.to_string(),
                serde_json::to_string(&root.shared)?,
                root.status.map(DocumentStatus::as_str),
                now,
            ],
        )?;
        conn.execute(
            "INSERT INTO document_locales (collection, id, locale, data) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(collection, id, locale) DO UPDATE SET data = excluded.data",
            params![
                collection,
                id.to_string(),
                root.locale.as_str(),
                serde_json::to_string(&root.localized)?,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn relations(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<RelationRecord>> {
        with_conn(&self.conn, |conn| query_relations(conn, collection, parent_id))
    }

    async fn rows(&self, table: RowTable, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<TreeBlock>> {
        with_conn(&self.conn, |conn| query_rows(conn, table, collection, parent_id))
    }

    async fn create_root(&self, collection: &str, id: DocumentId, root: &RootData) -> StorageResult<()> {
        with_conn(&self.conn, |conn| self.insert_root(conn, collection, id, root, false))
    }

    async fn update_root(&self, collection: &str, id: DocumentId, root: &RootData) -> StorageResult<()> {
        with_conn(&self.conn, |conn| self.insert_root(conn, collection, id, root, true))
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> StorageResult<bool> {
        with_conn(&self.conn, |conn| {
            let id = id.to_string();
            let deleted = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            conn.execute(
                "DELETE FROM document_locales WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            for table in ["relations", "blocks", "tree_blocks", "versions"] {
                conn.execute(
                    &format!("DELETE FROM {table} WHERE collection = ?1 AND parent_id = ?2"),
                    params![collection, id],
                )?;
            }
            Ok(deleted > 0)
        })
    }

    async fn create_relation(
        &self,
        collection: &str,
        parent_id: DocumentId,
        id: RowId,
        record: &RelationRecord,
    ) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute(
                "INSERT INTO relations (id, collection, parent_id, path, position, relation_to, relation_id, locale) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    collection,
                    parent_id.to_string(),
                    record.path.to_string(),
                    record.position as i64,
                    record.relation_to,
                    record.relation_id.to_string(),
                    record.locale.as_ref().map(Locale::as_str),
                ],
            )?;
            Ok(())
        })
    }

    async fn update_relation(&self, id: RowId, record: &RelationRecord) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            let changed = conn.execute(
                "UPDATE relations SET path = ?2, position = ?3, relation_to = ?4, relation_id = ?5, locale = ?6 \
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    record.path.to_string(),
                    record.position as i64,
                    record.relation_to,
                    record.relation_id.to_string(),
                    record.locale.as_ref().map(Locale::as_str),
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("relation {id}")));
            }
            Ok(())
        })
    }

    async fn delete_relation(&self, id: RowId) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute("DELETE FROM relations WHERE id = ?1", params![id.to_string()])?;
            Ok(())
        })
    }

    async fn create_row(
        &self,
        table: RowTable,
        collection: &str,
        parent_id: DocumentId,
        id: RowId,
        row: &TreeBlock,
    ) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (id, collection, parent_id, path, position, block_type, locale, data) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    id.to_string(),
                    collection,
                    parent_id.to_string(),
                    row.path.to_string(),
                    row.position as i64,
                    row.block_type,
                    row.locale.as_ref().map(Locale::as_str),
                    serde_json::to_string(&row.data)?,
                ],
            )?;
            Ok(())
        })
    }

    async fn update_row(&self, table: RowTable, id: RowId, row: &TreeBlock) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE {table} SET path = ?2, position = ?3, block_type = ?4, locale = ?5, data = ?6 \
                     WHERE id = ?1"
                ),
                params![
                    id.to_string(),
                    row.path.to_string(),
                    row.position as i64,
                    row.block_type,
                    row.locale.as_ref().map(Locale::as_str),
                    serde_json::to_string(&row.data)?,
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("{table} row {id}")));
            }
            Ok(())
        })
    }

    async fn delete_row(&self, table: RowTable, id: RowId) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id.to_string()])?;
            Ok(())
        })
    }

    async fn insert_version(&self, version: &VersionRow) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute(
                "INSERT INTO versions (id, collection, parent_id, status, locale, data, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    version.id.to_string(),
                    version.collection,
                    version.parent_id.to_string(),
                    version.status.as_str(),
                    version.locale.as_str(),
                    serde_json::to_string(&version.data)?,
                    encode_time(version.created_at),
                    encode_time(version.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    async fn update_version(&self, id: VersionId, status: DocumentStatus, data: &Data) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            let changed = conn.execute(
                "UPDATE versions SET status = ?2, data = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    id.to_string(),
                    status.as_str(),
                    serde_json::to_string(data)?,
                    encode_time(Utc::now()),
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("version {id}")));
            }
            Ok(())
        })
    }

    async fn prune_versions(&self, collection: &str, parent_id: DocumentId, keep: usize) -> StorageResult<usize> {
        with_conn(&self.conn, |conn| {
            let removed = conn.execute(
                "DELETE FROM versions WHERE collection = ?1 AND parent_id = ?2 AND id NOT IN ( \
                   SELECT id FROM versions WHERE collection = ?1 AND parent_id = ?2 \
                   ORDER BY created_at DESC, id DESC LIMIT ?3)",
                params![collection, parent_id.to_string(), keep as i64],
            )?;
            if removed > 0 {
                debug!("Pruned {} version(s) of {}/{}", removed, collection, parent_id);
            }
            Ok(removed)
        })
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        with_conn(&self.conn, |conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })?;
        self.open.store(false, Ordering::SeqCst);
        debug!("Transaction committed");
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.open.load(Ordering::SeqCst) {
            return;
        }
        match self.conn.lock() {
            Ok(conn) => match conn.execute_batch("ROLLBACK") {
                Ok(()) => debug!("Transaction rolled back"),
                Err(e) => warn!("Rollback failed: {}", e),
            },
            Err(e) => warn!("Rollback skipped, connection lock poisoned: {}", e),
        }
    }
}

//! `SQLite` entity store.
//!
//! Stores kinds, entities and edges in three tables and answers
//! [`EntityQuery`]s with one SQL statement each. Foreign keys enforce edge
//! endpoints and protect referenced kinds; edges cascade away with their
//! entities.

// SQLite hands back i64 for row ids and counts; both are non-negative here.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::config::EntityGraphConfig;
use crate::models::{
    Entity, EntityId, EntityKind, EntityKindId, EntityRef, EntityRelationship, NewEntity,
    NewEntityKind, RelationshipId, Scope,
};
use crate::query::{CacheSpec, EntityQuery, RelationshipCache};
use crate::storage::metrics::record_operation_metrics;
use crate::storage::sqlite::{
    DEFAULT_BUSY_TIMEOUT_MS, ENTITY_COLUMNS, acquire_lock, build_select_sql, configure_connection,
    map_sqlite_error, placeholders,
};
use crate::storage::traits::{EntityStore, GraphStats};
use crate::{Error, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Default number of entity ids per prefetch statement.
pub const DEFAULT_PREFETCH_BATCH_SIZE: usize = 500;

/// Ids per statement when updating or deleting a materialized id list.
const WRITE_CHUNK_SIZE: usize = 500;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entity_kind (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS entity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        display_name TEXT NOT NULL DEFAULT '',
        entity_ref_type TEXT NOT NULL,
        entity_ref_id INTEGER NOT NULL,
        entity_kind_id INTEGER NOT NULL
            REFERENCES entity_kind(id) ON DELETE RESTRICT,
        meta_json TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE (entity_ref_type, entity_ref_id, entity_kind_id)
    );

    CREATE TABLE IF NOT EXISTS entity_relationship (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sub_entity_id INTEGER NOT NULL
            REFERENCES entity(id) ON DELETE CASCADE,
        super_entity_id INTEGER NOT NULL
            REFERENCES entity(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_entity_is_active ON entity(is_active);
    CREATE INDEX IF NOT EXISTS idx_entity_display_name ON entity(display_name);
    CREATE INDEX IF NOT EXISTS idx_entity_kind ON entity(entity_kind_id);
    CREATE INDEX IF NOT EXISTS idx_entity_relationship_sub
        ON entity_relationship(sub_entity_id);
    CREATE INDEX IF NOT EXISTS idx_entity_relationship_super
        ON entity_relationship(super_entity_id);
";

/// `SQLite`-based entity store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and
/// `busy_timeout` handle other processes touching the same file.
///
/// # Schema
///
/// - `entity_kind`: named categories, unique by name
/// - `entity`: wrapped references, unique by `(ref type, ref id, kind)`
/// - `entity_relationship`: directed sub/super edges, duplicates allowed
pub struct SqliteEntityStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
    /// Entity ids per prefetch statement.
    prefetch_batch_size: usize,
}

impl SqliteEntityStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(db_path.into(), DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation_failed("open_entity_sqlite_memory", e))?;
        Self::initialize(conn, None, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Opens the store described by the configuration.
    ///
    /// Creates the parent directory of the database file when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn from_config(config: &EntityGraphConfig) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation_failed("create_data_dir", e))?;
        }
        Ok(Self::open(path, config.busy_timeout_ms)?
            .with_prefetch_batch_size(config.prefetch_batch_size))
    }

    fn open(db_path: PathBuf, busy_timeout_ms: u32) -> Result<Self> {
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::operation_failed("open_entity_sqlite", e))?;
        Self::initialize(conn, Some(db_path), busy_timeout_ms)
    }

    fn initialize(conn: Connection, db_path: Option<PathBuf>, busy_timeout_ms: u32) -> Result<Self> {
        configure_connection(&conn, busy_timeout_ms)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::operation_failed("create_entity_schema", e))?;
        tracing::debug!(path = ?db_path, "Initialized entity store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            prefetch_batch_size: DEFAULT_PREFETCH_BATCH_SIZE,
        })
    }

    /// Sets how many entity ids go into one prefetch statement.
    ///
    /// Zero is treated as one.
    #[must_use]
    pub fn with_prefetch_batch_size(mut self, batch_size: usize) -> Self {
        self.prefetch_batch_size = batch_size.max(1);
        self
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns the prefetch batch size.
    #[must_use]
    pub const fn prefetch_batch_size(&self) -> usize {
        self.prefetch_batch_size
    }

    /// Runs `f`, recording operation metrics around it.
    fn timed<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        record_operation_metrics(BACKEND, operation, start, &result);
        result
    }

    fn parse_kind_row(row: &Row<'_>) -> rusqlite::Result<EntityKind> {
        Ok(EntityKind {
            id: EntityKindId::new(row.get(0)?),
            name: row.get(1)?,
            display_name: row.get(2)?,
            is_active: row.get(3)?,
        })
    }

    /// Parses the [`ENTITY_COLUMNS`] starting at column `offset`.
    fn parse_entity_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Entity> {
        let ref_type: String = row.get(offset + 2)?;
        let meta_json: Option<String> = row.get(offset + 5)?;
        let entity_meta = meta_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(offset + 5, Type::Text, Box::new(e))
            })?;

        Ok(Entity {
            id: EntityId::new(row.get(offset)?),
            display_name: row.get(offset + 1)?,
            entity_ref: EntityRef::new(ref_type, row.get(offset + 3)?),
            entity_kind: EntityKindId::new(row.get(offset + 4)?),
            entity_meta,
            is_active: row.get(offset + 6)?,
        })
    }

    fn parse_entity_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
        Self::parse_entity_at(row, 0)
    }

    fn parse_relationship_row(row: &Row<'_>) -> rusqlite::Result<EntityRelationship> {
        Ok(EntityRelationship {
            id: RelationshipId::new(row.get(0)?),
            sub_entity: EntityId::new(row.get(1)?),
            super_entity: EntityId::new(row.get(2)?),
        })
    }

    fn serialize_meta(meta: Option<&serde_json::Value>) -> Result<Option<String>> {
        meta.map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::InvalidInput(format!("entity metadata: {e}")))
    }

    /// Materializes the ids a query describes.
    fn query_ids(conn: &Connection, query: &EntityQuery) -> Result<Vec<i64>> {
        let (sql, params) = build_select_sql(query, "e.id");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| map_sqlite_error("prepare_entity_ids", e))?;
        let ids = stmt
            .query_map(params_from_iter(params), |row| row.get(0))
            .map_err(|e| map_sqlite_error("query_entity_ids", e))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(|e| map_sqlite_error("read_entity_ids", e))?;
        Ok(ids)
    }

    /// Runs `sql_for(placeholders)` once per chunk of `ids`, binding the chunk
    /// `binds_per_chunk` times. Returns the summed affected row counts.
    fn execute_chunked(
        tx: &Transaction<'_>,
        operation: &'static str,
        ids: &[i64],
        binds_per_chunk: usize,
        leading: &[Value],
        sql_for: impl Fn(&str) -> String,
    ) -> Result<usize> {
        let mut affected = 0;
        for chunk in ids.chunks(WRITE_CHUNK_SIZE) {
            let sql = sql_for(&placeholders(chunk.len()));
            let mut values: Vec<Value> = leading.to_vec();
            for _ in 0..binds_per_chunk {
                values.extend(chunk.iter().map(|id| Value::Integer(*id)));
            }
            affected += tx
                .execute(&sql, params_from_iter(values))
                .map_err(|e| map_sqlite_error(operation, e))?;
        }
        Ok(affected)
    }

    fn neighbors(conn: &Connection, sql: &str, entity: EntityId) -> Result<Vec<Entity>> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| map_sqlite_error("prepare_neighbors", e))?;
        let entities = stmt
            .query_map(params![entity.get()], Self::parse_entity_row)
            .map_err(|e| map_sqlite_error("query_neighbors", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_sqlite_error("read_neighbors", e))?;
        Ok(entities)
    }

    /// Fills one direction of `cache` for every id, `batch` ids per statement.
    ///
    /// `anchor` is the edge column matched against the ids and `far` the
    /// column joined to the returned entity.
    fn prefetch_direction(
        &self,
        conn: &Connection,
        ids: &[EntityId],
        anchor: &str,
        far: &str,
        mut push: impl FnMut(EntityId, Entity),
    ) -> Result<()> {
        for chunk in ids.chunks(self.prefetch_batch_size) {
            let sql = format!(
                "SELECT r.{anchor}, {ENTITY_COLUMNS} FROM entity_relationship r \
                 JOIN entity e ON e.id = r.{far} \
                 WHERE r.{anchor} IN ({}) ORDER BY r.id",
                placeholders(chunk.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| map_sqlite_error("prepare_prefetch", e))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter().map(|id| id.get())), |row| {
                    Ok((EntityId::new(row.get(0)?), Self::parse_entity_at(row, 1)?))
                })
                .map_err(|e| map_sqlite_error("query_prefetch", e))?;
            for row in rows {
                let (anchor_id, entity) = row.map_err(|e| map_sqlite_error("read_prefetch", e))?;
                push(anchor_id, entity);
            }
        }
        Ok(())
    }
}

impl EntityStore for SqliteEntityStore {
    #[instrument(skip(self, kind), fields(name = %kind.name))]
    fn insert_kind(&self, kind: &NewEntityKind) -> Result<EntityKind> {
        Self::timed("insert_kind", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO entity_kind (name, display_name, is_active) VALUES (?1, ?2, ?3)",
                params![kind.name, kind.display_name, kind.is_active],
            )
            .map_err(|e| map_sqlite_error("insert_kind", e))?;
            let id = EntityKindId::new(conn.last_insert_rowid());
            metrics::counter!("entity_kinds_created_total").increment(1);
            Ok(kind.clone().into_kind(id))
        })
    }

    #[instrument(skip(self, kind), fields(kind_id = %kind.id))]
    fn update_kind(&self, kind: &EntityKind) -> Result<()> {
        Self::timed("update_kind", || {
            let conn = acquire_lock(&self.conn);
            let rows = conn
                .execute(
                    "UPDATE entity_kind SET name = ?1, display_name = ?2, is_active = ?3 \
                     WHERE id = ?4",
                    params![kind.name, kind.display_name, kind.is_active, kind.id.get()],
                )
                .map_err(|e| map_sqlite_error("update_kind", e))?;
            if rows == 0 {
                return Err(Error::not_found(format!("entity kind {}", kind.id)));
            }
            Ok(())
        })
    }

    #[instrument(skip(self))]
    fn get_kind(&self, id: EntityKindId) -> Result<Option<EntityKind>> {
        Self::timed("get_kind", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT id, name, display_name, is_active FROM entity_kind WHERE id = ?1",
                params![id.get()],
                Self::parse_kind_row,
            )
            .optional()
            .map_err(|e| map_sqlite_error("get_kind", e))
        })
    }

    #[instrument(skip(self))]
    fn find_kind(&self, name: &str, scope: Scope) -> Result<Option<EntityKind>> {
        Self::timed("find_kind", || {
            let conn = acquire_lock(&self.conn);
            let sql = match scope {
                Scope::Active => {
                    "SELECT id, name, display_name, is_active FROM entity_kind \
                     WHERE name = ?1 AND is_active = 1"
                },
                Scope::All => {
                    "SELECT id, name, display_name, is_active FROM entity_kind WHERE name = ?1"
                },
            };
            conn.query_row(sql, params![name], Self::parse_kind_row)
                .optional()
                .map_err(|e| map_sqlite_error("find_kind", e))
        })
    }

    #[instrument(skip(self))]
    fn list_kinds(&self, scope: Scope) -> Result<Vec<EntityKind>> {
        Self::timed("list_kinds", || {
            let conn = acquire_lock(&self.conn);
            let sql = match scope {
                Scope::Active => {
                    "SELECT id, name, display_name, is_active FROM entity_kind \
                     WHERE is_active = 1 ORDER BY name"
                },
                Scope::All => {
                    "SELECT id, name, display_name, is_active FROM entity_kind ORDER BY name"
                },
            };
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| map_sqlite_error("prepare_list_kinds", e))?;
            let kinds = stmt
                .query_map([], Self::parse_kind_row)
                .map_err(|e| map_sqlite_error("list_kinds", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_sqlite_error("read_kinds", e))?;
            Ok(kinds)
        })
    }

    #[instrument(skip(self))]
    fn delete_kind(&self, id: EntityKindId) -> Result<bool> {
        Self::timed("delete_kind", || {
            let conn = acquire_lock(&self.conn);
            let referencing: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM entity WHERE entity_kind_id = ?1",
                    params![id.get()],
                    |row| row.get(0),
                )
                .map_err(|e| map_sqlite_error("count_kind_references", e))?;
            if referencing > 0 {
                return Err(Error::IntegrityViolation(format!(
                    "entity kind {id} is still referenced by {referencing} entities"
                )));
            }
            let rows = conn
                .execute("DELETE FROM entity_kind WHERE id = ?1", params![id.get()])
                .map_err(|e| map_sqlite_error("delete_kind", e))?;
            Ok(rows > 0)
        })
    }

    #[instrument(skip(self, entity), fields(entity_ref = %entity.entity_ref))]
    fn insert_entity(&self, entity: &NewEntity) -> Result<Entity> {
        Self::timed("insert_entity", || {
            let meta = Self::serialize_meta(entity.entity_meta.as_ref())?;
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO entity (display_name, entity_ref_type, entity_ref_id, \
                 entity_kind_id, meta_json, is_active) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entity.display_name,
                    entity.entity_ref.ref_type.as_str(),
                    entity.entity_ref.ref_id,
                    entity.entity_kind.get(),
                    meta,
                    entity.is_active,
                ],
            )
            .map_err(|e| map_sqlite_error("insert_entity", e))?;
            let id = EntityId::new(conn.last_insert_rowid());
            metrics::counter!("entities_created_total").increment(1);
            Ok(entity.clone().into_entity(id))
        })
    }

    #[instrument(skip(self, entity), fields(entity_id = %entity.id))]
    fn update_entity(&self, entity: &Entity) -> Result<()> {
        Self::timed("update_entity", || {
            let meta = Self::serialize_meta(entity.entity_meta.as_ref())?;
            let conn = acquire_lock(&self.conn);
            let rows = conn
                .execute(
                    "UPDATE entity SET display_name = ?1, entity_ref_type = ?2, \
                     entity_ref_id = ?3, entity_kind_id = ?4, meta_json = ?5, is_active = ?6 \
                     WHERE id = ?7",
                    params![
                        entity.display_name,
                        entity.entity_ref.ref_type.as_str(),
                        entity.entity_ref.ref_id,
                        entity.entity_kind.get(),
                        meta,
                        entity.is_active,
                        entity.id.get(),
                    ],
                )
                .map_err(|e| map_sqlite_error("update_entity", e))?;
            if rows == 0 {
                return Err(Error::not_found(format!("entity {}", entity.id)));
            }
            Ok(())
        })
    }

    #[instrument(skip(self))]
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        Self::timed("get_entity", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entity e WHERE e.id = ?1"),
                params![id.get()],
                Self::parse_entity_row,
            )
            .optional()
            .map_err(|e| map_sqlite_error("get_entity", e))
        })
    }

    #[instrument(skip(self, query), fields(filters = query.filters().len(), scope = %query.scope()))]
    fn fetch(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        Self::timed("fetch", || {
            let (sql, params) = build_select_sql(query, ENTITY_COLUMNS);
            tracing::trace!(%sql, "Fetching entities");
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| map_sqlite_error("prepare_fetch", e))?;
            let entities = stmt
                .query_map(params_from_iter(params), Self::parse_entity_row)
                .map_err(|e| map_sqlite_error("fetch", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_sqlite_error("read_entities", e))?;
            Ok(entities)
        })
    }

    #[instrument(skip(self, query), fields(filters = query.filters().len(), scope = %query.scope()))]
    fn count(&self, query: &EntityQuery) -> Result<usize> {
        Self::timed("count", || {
            let (inner, params) = build_select_sql(query, "e.id");
            let sql = format!("SELECT COUNT(*) FROM ({inner})");
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row(&sql, params_from_iter(params), |row| row.get(0))
                .map_err(|e| map_sqlite_error("count", e))?;
            Ok(count as usize)
        })
    }

    #[instrument(skip(self, query), fields(filters = query.filters().len()))]
    fn set_active(&self, query: &EntityQuery, active: bool) -> Result<usize> {
        Self::timed("set_active", || {
            let mut conn = acquire_lock(&self.conn);
            let ids = Self::query_ids(&conn, query)?;
            if ids.is_empty() {
                return Ok(0);
            }
            let tx = conn
                .transaction()
                .map_err(|e| map_sqlite_error("begin_set_active", e))?;
            Self::execute_chunked(
                &tx,
                "set_active",
                &ids,
                1,
                &[Value::Integer(i64::from(active))],
                |marks| format!("UPDATE entity SET is_active = ? WHERE id IN ({marks})"),
            )?;
            tx.commit()
                .map_err(|e| map_sqlite_error("commit_set_active", e))?;

            let counter = if active {
                "entities_activated_total"
            } else {
                "entities_deactivated_total"
            };
            metrics::counter!(counter).increment(ids.len() as u64);
            Ok(ids.len())
        })
    }

    #[instrument(skip(self, query), fields(filters = query.filters().len()))]
    fn delete(&self, query: &EntityQuery) -> Result<usize> {
        Self::timed("delete", || {
            let mut conn = acquire_lock(&self.conn);
            let ids = Self::query_ids(&conn, query)?;
            if ids.is_empty() {
                return Ok(0);
            }
            let tx = conn
                .transaction()
                .map_err(|e| map_sqlite_error("begin_delete", e))?;
            let edges = Self::execute_chunked(&tx, "delete_edges", &ids, 2, &[], |marks| {
                format!(
                    "DELETE FROM entity_relationship \
                     WHERE sub_entity_id IN ({marks}) OR super_entity_id IN ({marks})"
                )
            })?;
            let deleted = Self::execute_chunked(&tx, "delete_entities", &ids, 1, &[], |marks| {
                format!("DELETE FROM entity WHERE id IN ({marks})")
            })?;
            tx.commit()
                .map_err(|e| map_sqlite_error("commit_delete", e))?;

            tracing::debug!(entities = deleted, edges, "Deleted entities");
            metrics::counter!("entities_deleted_total").increment(deleted as u64);
            Ok(deleted)
        })
    }

    #[instrument(skip(self))]
    fn insert_relationship(&self, sub: EntityId, sup: EntityId) -> Result<EntityRelationship> {
        Self::timed("insert_relationship", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO entity_relationship (sub_entity_id, super_entity_id) VALUES (?1, ?2)",
                params![sub.get(), sup.get()],
            )
            .map_err(|e| map_sqlite_error("insert_relationship", e))?;
            metrics::counter!("entity_relationships_created_total").increment(1);
            Ok(EntityRelationship {
                id: RelationshipId::new(conn.last_insert_rowid()),
                sub_entity: sub,
                super_entity: sup,
            })
        })
    }

    #[instrument(skip(self))]
    fn delete_relationship(&self, id: RelationshipId) -> Result<bool> {
        Self::timed("delete_relationship", || {
            let conn = acquire_lock(&self.conn);
            let rows = conn
                .execute(
                    "DELETE FROM entity_relationship WHERE id = ?1",
                    params![id.get()],
                )
                .map_err(|e| map_sqlite_error("delete_relationship", e))?;
            Ok(rows > 0)
        })
    }

    #[instrument(skip(self))]
    fn delete_relationships_between(&self, sub: EntityId, sup: EntityId) -> Result<usize> {
        Self::timed("delete_relationships_between", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "DELETE FROM entity_relationship WHERE sub_entity_id = ?1 AND super_entity_id = ?2",
                params![sub.get(), sup.get()],
            )
            .map_err(|e| map_sqlite_error("delete_relationships_between", e))
        })
    }

    #[instrument(skip(self))]
    fn relationships_of(&self, entity: EntityId) -> Result<Vec<EntityRelationship>> {
        Self::timed("relationships_of", || {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, sub_entity_id, super_entity_id FROM entity_relationship \
                     WHERE sub_entity_id = ?1 OR super_entity_id = ?1 ORDER BY id",
                )
                .map_err(|e| map_sqlite_error("prepare_relationships_of", e))?;
            let edges = stmt
                .query_map(params![entity.get()], Self::parse_relationship_row)
                .map_err(|e| map_sqlite_error("relationships_of", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_sqlite_error("read_relationships", e))?;
            Ok(edges)
        })
    }

    #[instrument(skip(self))]
    fn super_entities(&self, entity: EntityId) -> Result<Vec<Entity>> {
        Self::timed("super_entities", || {
            let conn = acquire_lock(&self.conn);
            Self::neighbors(
                &conn,
                &format!(
                    "SELECT {ENTITY_COLUMNS} FROM entity_relationship r \
                     JOIN entity e ON e.id = r.super_entity_id \
                     WHERE r.sub_entity_id = ?1 ORDER BY r.id"
                ),
                entity,
            )
        })
    }

    #[instrument(skip(self))]
    fn sub_entities(&self, entity: EntityId) -> Result<Vec<Entity>> {
        Self::timed("sub_entities", || {
            let conn = acquire_lock(&self.conn);
            Self::neighbors(
                &conn,
                &format!(
                    "SELECT {ENTITY_COLUMNS} FROM entity_relationship r \
                     JOIN entity e ON e.id = r.sub_entity_id \
                     WHERE r.super_entity_id = ?1 ORDER BY r.id"
                ),
                entity,
            )
        })
    }

    #[instrument(skip(self, ids), fields(entities = ids.len()))]
    fn prefetch_relationships(
        &self,
        ids: &[EntityId],
        spec: CacheSpec,
    ) -> Result<RelationshipCache> {
        let mut cache = RelationshipCache::primed(spec, ids);
        if spec.is_empty() || ids.is_empty() {
            return Ok(cache);
        }
        Self::timed("prefetch_relationships", || {
            let conn = acquire_lock(&self.conn);
            if spec.include_super {
                self.prefetch_direction(&conn, ids, "sub_entity_id", "super_entity_id", |sub, e| {
                    cache.push_super(sub, e);
                })?;
            }
            if spec.include_sub {
                self.prefetch_direction(&conn, ids, "super_entity_id", "sub_entity_id", |sup, e| {
                    cache.push_sub(sup, e);
                })?;
            }
            Ok(())
        })?;
        Ok(cache)
    }

    #[instrument(skip(self))]
    fn stats(&self) -> Result<GraphStats> {
        Self::timed("stats", || {
            let conn = acquire_lock(&self.conn);
            let count = |sql: &str| -> Result<usize> {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                    .map(|n| n as usize)
                    .map_err(|e| map_sqlite_error("stats_count", e))
            };

            let kind_count = count("SELECT COUNT(*) FROM entity_kind")?;
            let active_kind_count = count("SELECT COUNT(*) FROM entity_kind WHERE is_active = 1")?;
            let entity_count = count("SELECT COUNT(*) FROM entity")?;
            let active_entity_count = count("SELECT COUNT(*) FROM entity WHERE is_active = 1")?;
            let relationship_count = count("SELECT COUNT(*) FROM entity_relationship")?;

            let mut stmt = conn
                .prepare(
                    "SELECT k.name, COUNT(e.id) FROM entity_kind k \
                     LEFT JOIN entity e ON e.entity_kind_id = k.id GROUP BY k.id, k.name",
                )
                .map_err(|e| map_sqlite_error("prepare_stats_by_kind", e))?;
            let entities_by_kind = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                })
                .map_err(|e| map_sqlite_error("stats_by_kind", e))?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()
                .map_err(|e| map_sqlite_error("read_stats_by_kind", e))?;

            Ok(GraphStats {
                kind_count,
                active_kind_count,
                entity_count,
                active_entity_count,
                relationship_count,
                entities_by_kind,
            })
        })
    }
}

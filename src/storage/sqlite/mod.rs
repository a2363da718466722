//! Shared `SQLite` infrastructure for the entity store.
//!
//! - [`connection`]: mutex handling, pragmas, error mapping
//! - [`sql`]: translation of [`EntityQuery`](crate::query::EntityQuery) into SQL

mod connection;
mod sql;

pub use connection::{
    DEFAULT_BUSY_TIMEOUT_MS, acquire_lock, configure_connection, map_sqlite_error,
};
pub use sql::{ENTITY_COLUMNS, build_entity_where_clause, build_select_sql, placeholders};

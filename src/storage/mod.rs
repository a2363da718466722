//! Storage layer abstraction.
//!
//! The query engine talks to an [`EntityStore`]; two backends implement it:
//! - **`SQLite`**: authoritative storage, queries translated to SQL
//! - **Memory**: direct evaluation, used by tests and as a semantic reference

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod entity;
pub mod metrics;
pub mod sqlite;
pub mod traits;

pub use entity::{InMemoryEntityStore, SqliteEntityStore};
pub use traits::{EntityStore, GraphStats};

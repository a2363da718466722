//! Entity store backends.
//!
//! - [`SqliteEntityStore`]: embedded relational store, the default
//! - [`InMemoryEntityStore`]: direct evaluation for tests

mod memory;
mod sqlite;

pub use memory::InMemoryEntityStore;
pub use sqlite::{DEFAULT_PREFETCH_BATCH_SIZE, SqliteEntityStore};

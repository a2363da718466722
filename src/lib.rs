//! # entitygraph
//!
//! Wraps arbitrary domain objects in lightweight, activatable [`Entity`]
//! records and connects them with directed super/sub relationships.
//!
//! The interesting part is the relationship query engine: chainable filters
//! that answer "which entities are sub to X (or to any/all of a set),
//! directly or by kind", layered over a relational store and always scoped to
//! active entities unless the caller asks for everything.
//!
//! ## Example
//!
//! ```rust
//! use entitygraph::models::{EntityRef, NewEntity, NewEntityKind};
//! use entitygraph::services::EntityService;
//! use entitygraph::storage::entity::SqliteEntityStore;
//!
//! # fn main() -> entitygraph::Result<()> {
//! let service = EntityService::new(SqliteEntityStore::in_memory()?);
//!
//! let team_kind = service.create_kind(NewEntityKind::new("team", "Team"))?;
//! let user_kind = service.create_kind(NewEntityKind::new("user", "User"))?;
//!
//! let team = service.create_entity(NewEntity::new(EntityRef::new("team", 1), team_kind.id))?;
//! let alice = service.create_entity(NewEntity::new(EntityRef::new("user", 7), user_kind.id))?;
//! service.add_relationship(&alice.id, &team.id)?;
//!
//! let members = service
//!     .objects()
//!     .is_any_kind(&[user_kind.id])
//!     .is_sub_to_all(&[team.id])
//!     .entities()?;
//! assert_eq!(members, vec![alice]);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod query;
pub mod services;
pub mod storage;

pub use config::EntityGraphConfig;
pub use models::{
    Activatable, Entity, EntityId, EntityKind, EntityKindId, EntityRef, EntityRelationship,
    NewEntity, NewEntityKind, Scope, TypeTag,
};
pub use query::{EntityQuery, RelationshipCache};
pub use services::{EntityRows, EntityService, EntitySet};
pub use storage::{EntityStore, InMemoryEntityStore, SqliteEntityStore};

/// Error type for entity graph operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | A point lookup (`get_for_reference`, kind by name) matches nothing |
/// | `MultipleFound` | A point lookup matches more than one row |
/// | `IntegrityViolation` | Duplicate `(reference, kind)`, duplicate kind name, deleting a referenced kind, edge to a missing entity |
/// | `InvalidInput` | Malformed CLI/config input, unregistered reference type |
/// | `OperationFailed` | Store I/O fails for any other reason |
///
/// Empty filter arguments are never an error: they leave the set unchanged.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A point lookup matched zero rows.
    #[error("not found: {what}")]
    NotFound {
        /// Description of what was looked up.
        what: String,
    },

    /// A point lookup matched more than one row.
    #[error("expected one match for {what}, found {count}")]
    MultipleFound {
        /// Description of what was looked up.
        what: String,
        /// Number of rows that matched.
        count: usize,
    },

    /// A store constraint rejected the write.
    ///
    /// Raised when:
    /// - an entity with the same `(reference, kind)` already exists
    /// - an entity kind with the same name already exists
    /// - an entity kind is deleted while entities still reference it
    /// - a relationship points at an entity that does not exist
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a [`Error::NotFound`] for the given description.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Builds a [`Error::OperationFailed`] from an operation name and cause.
    pub fn operation_failed(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for entity graph operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("entity for user:7");
        assert_eq!(err.to_string(), "not found: entity for user:7");

        let err = Error::MultipleFound {
            what: "entity for user:7".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "expected one match for entity for user:7, found 2"
        );

        let err = Error::IntegrityViolation("duplicate kind name 'team'".to_string());
        assert_eq!(
            err.to_string(),
            "integrity violation: duplicate kind name 'team'"
        );

        let err = Error::operation_failed("fetch_entities", "disk I/O error");
        assert_eq!(
            err.to_string(),
            "operation 'fetch_entities' failed: disk I/O error"
        );
    }
}

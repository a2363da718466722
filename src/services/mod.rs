//! Business logic services.
//!
//! [`EntityService`] owns a store and hands out [`EntitySet`]s, which
//! materialize into [`EntityRows`].

mod entity;
mod entity_set;

pub use entity::EntityService;
pub use entity_set::{EntityRows, EntitySet};

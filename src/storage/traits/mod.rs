//! Storage backend traits.

mod entity;

pub use entity::{EntityStore, GraphStats};

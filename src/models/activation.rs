//! Activation (soft-delete) overlay.
//!
//! Activatable records are never removed by the standard delete path: they
//! are marked inactive and disappear from the default, active-only view.
//! Physical removal is only performed when explicitly forced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A record that carries an `is_active` flag.
pub trait Activatable {
    /// Returns true if the record is active.
    fn is_active(&self) -> bool;

    /// Sets the activation flag.
    fn set_active(&mut self, active: bool);

    /// Marks the record active.
    fn activate(&mut self) {
        self.set_active(true);
    }

    /// Marks the record inactive.
    fn deactivate(&mut self) {
        self.set_active(false);
    }
}

/// Default visibility of a query.
///
/// `Active` is what the standard entry points use; `All` widens the view to
/// inactive rows as well, and is the basis for explicit
/// `active()`/`inactive()` narrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only active rows are visible.
    #[default]
    Active,
    /// Active and inactive rows are visible.
    All,
}

impl Scope {
    /// Returns the scope as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::All => "all",
        }
    }

    /// Returns true if a record with the given activation is visible.
    #[must_use]
    pub const fn admits(&self, is_active: bool) -> bool {
        match self {
            Self::Active => is_active,
            Self::All => true,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

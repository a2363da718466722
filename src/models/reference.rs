//! Polymorphic references to the domain objects wrapped by entities.
//!
//! An [`EntityRef`] is an explicit `(type tag, id)` pair. Resolving it back
//! to the domain object goes through a [`ReferenceRegistry`] that maps each
//! tag to a [`ReferenceResolver`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Names the type of a wrapped domain object (for example `"user"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    /// Creates a type tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for TypeTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Reference to a domain object: its type tag and its identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Type of the domain object.
    pub ref_type: TypeTag,
    /// Identifier of the domain object within its type.
    pub ref_id: i64,
}

impl EntityRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(ref_type: impl Into<TypeTag>, ref_id: i64) -> Self {
        Self {
            ref_type: ref_type.into(),
            ref_id,
        }
    }

    /// Parses a `type:id` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string has no `:` separator,
    /// an empty type, or a non-integer id.
    pub fn parse(s: &str) -> Result<Self> {
        let (ref_type, ref_id) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidInput(format!("expected type:id, got '{s}'")))?;
        if ref_type.is_empty() {
            return Err(Error::InvalidInput(format!("empty reference type in '{s}'")));
        }
        let ref_id = ref_id
            .parse::<i64>()
            .map_err(|e| Error::InvalidInput(format!("invalid reference id in '{s}': {e}")))?;
        Ok(Self::new(ref_type, ref_id))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ref_type, self.ref_id)
    }
}

/// A domain object that knows its own reference.
pub trait Referenceable {
    /// Tag shared by every object of this type.
    fn type_tag() -> TypeTag;

    /// Identifier of this object within its type.
    fn reference_id(&self) -> i64;

    /// Builds the reference to this object.
    fn entity_ref(&self) -> EntityRef {
        EntityRef {
            ref_type: Self::type_tag(),
            ref_id: self.reference_id(),
        }
    }
}

/// Loads a domain object by id for one type tag.
pub trait ReferenceResolver: Send + Sync {
    /// Returns the object with the given id, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn resolve(&self, ref_id: i64) -> Result<Option<serde_json::Value>>;
}

impl<F> ReferenceResolver for F
where
    F: Fn(i64) -> Result<Option<serde_json::Value>> + Send + Sync,
{
    fn resolve(&self, ref_id: i64) -> Result<Option<serde_json::Value>> {
        self(ref_id)
    }
}

/// Maps type tags to resolvers.
#[derive(Clone, Default)]
pub struct ReferenceRegistry {
    resolvers: HashMap<TypeTag, Arc<dyn ReferenceResolver>>,
}

impl ReferenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the resolver for a tag.
    pub fn register(
        &mut self,
        tag: impl Into<TypeTag>,
        resolver: impl ReferenceResolver + 'static,
    ) -> &mut Self {
        self.resolvers.insert(tag.into(), Arc::new(resolver));
        self
    }

    /// Returns true if a resolver is registered for the tag.
    #[must_use]
    pub fn is_registered(&self, tag: &TypeTag) -> bool {
        self.resolvers.contains_key(tag)
    }

    /// Returns the registered tags in sorted order.
    #[must_use]
    pub fn tags(&self) -> Vec<&TypeTag> {
        let mut tags: Vec<&TypeTag> = self.resolvers.keys().collect();
        tags.sort();
        tags
    }

    /// Resolves a reference to its domain object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no resolver is registered for the
    /// reference's tag, [`Error::NotFound`] if the resolver finds nothing,
    /// and propagates resolver failures unchanged.
    pub fn resolve(&self, reference: &EntityRef) -> Result<serde_json::Value> {
        let resolver = self.resolvers.get(&reference.ref_type).ok_or_else(|| {
            Error::InvalidInput(format!(
                "no resolver registered for type '{}'",
                reference.ref_type
            ))
        })?;
        resolver
            .resolve(reference.ref_id)?
            .ok_or_else(|| Error::not_found(format!("domain object {reference}")))
    }
}

impl fmt::Debug for ReferenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Account {
        id: i64,
    }

    impl Referenceable for Account {
        fn type_tag() -> TypeTag {
            TypeTag::new("account")
        }

        fn reference_id(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_referenceable_builds_ref() {
        let account = Account { id: 42 };
        assert_eq!(account.entity_ref(), EntityRef::new("account", 42));
        assert_eq!(account.entity_ref().to_string(), "account:42");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            EntityRef::parse("user:7").unwrap(),
            EntityRef::new("user", 7)
        );
        assert_eq!(
            EntityRef::parse("app.user:-3").unwrap(),
            EntityRef::new("app.user", -3)
        );
        assert!(matches!(
            EntityRef::parse("user"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            EntityRef::parse(":7"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            EntityRef::parse("user:seven"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_registry_resolves_registered_tag() {
        let mut registry = ReferenceRegistry::new();
        registry.register("user", |id: i64| -> Result<Option<serde_json::Value>> {
            Ok((id == 7).then(|| json!({ "id": id, "name": "alice" })))
        });

        let value = registry.resolve(&EntityRef::new("user", 7)).unwrap();
        assert_eq!(value["name"], "alice");

        assert!(matches!(
            registry.resolve(&EntityRef::new("user", 8)),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            registry.resolve(&EntityRef::new("team", 1)),
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.is_registered(&TypeTag::new("user")));
        assert_eq!(registry.tags(), vec![&TypeTag::new("user")]);
    }
}

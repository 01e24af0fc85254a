//! Per-space type registry.

use crate::config::SchemaConflictPolicy;
use crate::error::{CoreError, CoreResult};
use crate::schema::TypeDescriptor;
use crate::types::SpaceName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a type registration.
#[derive(Debug, Clone)]
pub enum Registration {
    /// The type was not registered before.
    Added,
    /// An identical descriptor was already registered.
    Unchanged,
    /// A different descriptor was replaced.
    Replaced {
        /// The descriptor that was replaced.
        previous: Arc<TypeDescriptor>,
    },
    /// A different descriptor is registered and the policy keeps it.
    Rejected,
}

impl Registration {
    /// Returns true unless the registration was rejected.
    pub fn accepted(&self) -> bool {
        !matches!(self, Registration::Rejected)
    }
}

/// Holds the type descriptors of every space.
///
/// Type names are matched case-insensitively.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<(SpaceName, String), Arc<TypeDescriptor>>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or updates a descriptor.
    ///
    /// Returns the outcome and the descriptor now registered under the name.
    pub fn register(
        &self,
        space: &SpaceName,
        descriptor: TypeDescriptor,
        policy: SchemaConflictPolicy,
    ) -> CoreResult<(Registration, Arc<TypeDescriptor>)> {
        descriptor.validate()?;
        let key = (space.clone(), descriptor.type_key());
        let mut types = self.types.write();

        let outcome = match types.get(&key) {
            None => Registration::Added,
            Some(existing) if **existing == descriptor => {
                return Ok((Registration::Unchanged, Arc::clone(existing)))
            }
            Some(existing) => match policy {
                SchemaConflictPolicy::Reject => {
                    return Ok((Registration::Rejected, Arc::clone(existing)))
                }
                SchemaConflictPolicy::Replace => Registration::Replaced {
                    previous: Arc::clone(existing),
                },
            },
        };

        let descriptor = Arc::new(descriptor);
        types.insert(key, Arc::clone(&descriptor));
        Ok((outcome, descriptor))
    }

    /// Removes a descriptor, returning it if it was registered.
    pub fn unregister(&self, space: &SpaceName, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types
            .write()
            .remove(&(space.clone(), type_name.to_lowercase()))
    }

    /// Looks up a descriptor.
    pub fn get(&self, space: &SpaceName, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types
            .read()
            .get(&(space.clone(), type_name.to_lowercase()))
            .cloned()
    }

    /// Looks up a descriptor, failing with a schema error if it is absent.
    pub fn require(&self, space: &SpaceName, type_name: &str) -> CoreResult<Arc<TypeDescriptor>> {
        self.get(space, type_name)
            .ok_or_else(|| CoreError::unknown_type(space, type_name))
    }

    /// Returns the descriptors registered in a space, sorted by name.
    pub fn types(&self, space: &SpaceName) -> Vec<Arc<TypeDescriptor>> {
        let mut types: Vec<_> = self
            .types
            .read()
            .iter()
            .filter(|((s, _), _)| s == space)
            .map(|(_, d)| Arc::clone(d))
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    /// Removes every descriptor.
    pub fn clear(&self) {
        self.types.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};

    fn person() -> TypeDescriptor {
        TypeDescriptor::new("Person").field(FieldDescriptor::new("age", FieldType::Integer))
    }

    #[test]
    fn register_is_idempotent() {
        let registry = TypeRegistry::new();
        let space = SpaceName::named("people");

        let (first, _) = registry
            .register(&space, person(), SchemaConflictPolicy::Reject)
            .unwrap();
        let (second, _) = registry
            .register(&space, person(), SchemaConflictPolicy::Reject)
            .unwrap();

        assert!(matches!(first, Registration::Added));
        assert!(matches!(second, Registration::Unchanged));
    }

    #[test]
    fn conflicting_descriptor_follows_policy() {
        let registry = TypeRegistry::new();
        let space = SpaceName::DEFAULT;
        registry
            .register(&space, person(), SchemaConflictPolicy::Replace)
            .unwrap();

        let changed = person().field(FieldDescriptor::new("name", FieldType::Text));
        let (outcome, current) = registry
            .register(&space, changed.clone(), SchemaConflictPolicy::Reject)
            .unwrap();
        assert!(!outcome.accepted());
        assert_eq!(current.fields.len(), 1);

        let (outcome, current) = registry
            .register(&space, changed, SchemaConflictPolicy::Replace)
            .unwrap();
        assert!(matches!(outcome, Registration::Replaced { .. }));
        assert_eq!(current.fields.len(), 2);
    }

    #[test]
    fn lookup_is_case_insensitive_and_scoped_by_space() {
        let registry = TypeRegistry::new();
        registry
            .register(&SpaceName::named("a"), person(), SchemaConflictPolicy::Replace)
            .unwrap();

        assert!(registry.get(&SpaceName::named("a"), "PERSON").is_some());
        assert!(registry.get(&SpaceName::named("b"), "Person").is_none());
        assert!(registry.require(&SpaceName::DEFAULT, "Person").is_err());

        assert!(registry.unregister(&SpaceName::named("a"), "person").is_some());
        assert!(registry.types(&SpaceName::named("a")).is_empty());
    }

    #[test]
    fn invalid_descriptor_is_rejected() {
        let registry = TypeRegistry::new();
        let err = registry
            .register(&SpaceName::DEFAULT, TypeDescriptor::new(""), SchemaConflictPolicy::Replace)
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }
}

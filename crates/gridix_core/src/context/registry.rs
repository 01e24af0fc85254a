//! Typed component registry.
//!
//! Sibling subsystems are registered under their [`ComponentKind`] and
//! looked up by kind. At most one component of each kind is present.

use crate::context::CacheSource;
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kinds of subsystem a grid node is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    /// Node discovery.
    Discovery,
    /// Node-to-node messaging.
    Communication,
    /// Primary cache (authoritative key/value source).
    Cache,
    /// Off-heap swap space.
    Swap,
    /// Task scheduling.
    Scheduler,
    /// Authentication and authorization.
    Security,
    /// REST endpoint.
    Rest,
    /// Outgoing mail.
    Email,
    /// Indexing and query engine.
    Indexing,
    /// Third-party plugin.
    Plugin,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Discovery => "discovery",
            ComponentKind::Communication => "communication",
            ComponentKind::Cache => "cache",
            ComponentKind::Swap => "swap",
            ComponentKind::Scheduler => "scheduler",
            ComponentKind::Security => "security",
            ComponentKind::Rest => "rest",
            ComponentKind::Email => "email",
            ComponentKind::Indexing => "indexing",
            ComponentKind::Plugin => "plugin",
        };
        f.write_str(name)
    }
}

/// A subsystem registered in the runtime context.
///
/// Capability accessors default to `None`; a component overrides the ones
/// it provides.
pub trait Component: Send + Sync {
    /// Kind this component is registered under.
    fn kind(&self) -> ComponentKind;

    /// Human-readable component name.
    fn name(&self) -> &str;

    /// Returns this component as an authoritative cache source.
    fn cache_source(self: Arc<Self>) -> Option<Arc<dyn CacheSource>> {
        None
    }
}

/// Components of one node, keyed by kind.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<HashMap<ComponentKind, Arc<dyn Component>>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component.
    ///
    /// Fails if a component of the same kind is already present.
    pub fn add(&self, component: Arc<dyn Component>) -> CoreResult<()> {
        let kind = component.kind();
        let mut components = self.components.write();
        if components.contains_key(&kind) {
            return Err(CoreError::DuplicateComponent(kind));
        }
        components.insert(kind, component);
        Ok(())
    }

    /// Removes and returns the component of the given kind.
    pub fn remove(&self, kind: ComponentKind) -> Option<Arc<dyn Component>> {
        self.components.write().remove(&kind)
    }

    /// Looks up a component.
    pub fn get(&self, kind: ComponentKind) -> Option<Arc<dyn Component>> {
        self.components.read().get(&kind).cloned()
    }

    /// Looks up a component, failing if it is absent.
    pub fn require(&self, kind: ComponentKind) -> CoreResult<Arc<dyn Component>> {
        self.get(kind).ok_or(CoreError::ComponentMissing(kind))
    }

    /// Returns the registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<_> = self.components.read().keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

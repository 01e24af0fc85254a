//! Runtime context of a grid node.
//!
//! The context is the engine's only view of the enclosing node: its name
//! and id for logging, its liveness state, its clock, and the registry used
//! to find sibling components such as the primary cache.

mod cache;
mod clock;
mod registry;

pub use cache::{CacheSource, MemoryCache, SourceEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{Component, ComponentKind, ComponentRegistry};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Liveness state of a grid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GridState {
    /// Components are being started.
    Starting = 0,
    /// Node is running.
    Started = 1,
    /// Node is shutting down.
    Stopping = 2,
    /// Node has stopped.
    Stopped = 3,
}

impl GridState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => GridState::Starting,
            1 => GridState::Started,
            2 => GridState::Stopping,
            _ => GridState::Stopped,
        }
    }
}

/// Runtime context shared by the components of one node.
#[derive(Debug)]
pub struct GridContext {
    grid_name: String,
    node_id: Uuid,
    state: AtomicU8,
    clock: Arc<dyn Clock>,
    components: ComponentRegistry,
}

impl GridContext {
    /// Creates a context with a random node id and the system clock.
    pub fn new(grid_name: impl Into<String>) -> Self {
        Self {
            grid_name: grid_name.into(),
            node_id: Uuid::new_v4(),
            state: AtomicU8::new(GridState::Starting as u8),
            clock: Arc::new(SystemClock),
            components: ComponentRegistry::new(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the node id.
    #[must_use]
    pub fn with_node_id(mut self, node_id: Uuid) -> Self {
        self.node_id = node_id;
        self
    }

    /// Returns the grid name.
    pub fn grid_name(&self) -> &str {
        &self.grid_name
    }

    /// Returns the node id.
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Returns the clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the component registry.
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Returns the current liveness state.
    pub fn state(&self) -> GridState {
        GridState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Sets the liveness state.
    pub fn set_state(&self, state: GridState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Returns true once shutdown has begun.
    pub fn is_stopping(&self) -> bool {
        matches!(self.state(), GridState::Stopping | GridState::Stopped)
    }

    /// Returns the authoritative cache registered as the `Cache` component.
    pub fn cache_source(&self) -> Option<Arc<dyn CacheSource>> {
        self.components
            .get(ComponentKind::Cache)
            .and_then(|component| component.cache_source())
    }
}

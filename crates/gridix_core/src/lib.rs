//! # Gridix Core
//!
//! Secondary indexing and query engine for the Gridix in-memory data grid.
//!
//! This crate provides:
//! - A per-space registry of value types and their indexed fields
//! - Ordered field indexes and a text index per registered type
//! - A version gate that discards stale stores and resurrections
//! - Swap synchronization for values evicted from memory
//! - Field, row and text queries streamed through batched cursors
//! - Lifecycle management within a node's runtime context
//!
//! ## Usage
//!
//! ```rust
//! use gridix_core::{
//!     FieldDescriptor, FieldType, GridContext, IndexingConfig, IndexingEngine, SpaceName,
//!     TypeDescriptor, Value, Version,
//! };
//! use std::sync::Arc;
//!
//! let engine = Arc::new(IndexingEngine::new(IndexingConfig::default()));
//! engine.start(Arc::new(GridContext::new("grid")))?;
//!
//! let space = SpaceName::DEFAULT;
//! let note = TypeDescriptor::new("Note")
//!     .field(FieldDescriptor::new("body", FieldType::Text))
//!     .text_field("body");
//! engine.register_type(&space, note.clone())?;
//! engine.store(
//!     &space,
//!     &note,
//!     Value::Integer(1),
//!     Value::object([("body", "rust in the grid")]),
//!     Version::from_u64(1),
//!     0,
//! )?;
//!
//! let hits: Vec<_> = engine
//!     .query_text(&space, "grid", &note, None)?
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(hits[0].0, Value::Integer(1));
//! # Ok::<(), gridix_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod engine;
mod error;
mod gate;
mod index;
mod query;
mod rebuild;
mod schema;
mod stats;
mod swap;
mod types;

pub use config::{IndexingConfig, SchemaConflictPolicy, TypeMigrationPolicy};
pub use context::{
    CacheSource, Clock, Component, ComponentKind, ComponentRegistry, GridContext, GridState,
    ManualClock, MemoryCache, SourceEntry, SystemClock,
};
pub use engine::IndexingEngine;
pub use error::{CoreError, CoreResult};
pub use gate::VersionGate;
pub use gridix_codec::{CodecError, Value};
pub use index::{IndexEntry, TableInfo, TokenizerConfig, ValueRange};
pub use query::{FieldMetadata, FieldsCursor, QueryFilter, RowCursor};
pub use rebuild::RebuildReport;
pub use schema::{
    FieldDescriptor, FieldType, Registration, TypeDescriptor, TypeRegistry, KEY_FIELD,
    VALUE_FIELD,
};
pub use stats::{IndexingStats, StatsSnapshot};
pub use swap::UnswapOutcome;
pub use types::{SpaceName, Version, NEVER_EXPIRES, UNKNOWN_TYPE_SIZE};

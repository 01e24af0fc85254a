//! Error types for the Gridix indexing engine.

use crate::context::ComponentKind;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in indexing and query operations.
///
/// Stale updates are not errors: they are discarded silently and counted
/// in [`IndexingStats`](crate::IndexingStats).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] gridix_codec::CodecError),

    /// I/O error (background rebuild thread could not be spawned).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Query or store references an unregistered type, an unknown field,
    /// or a value that contradicts the declared field type.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the schema problem.
        message: String,
    },

    /// Query text is malformed or its parameters do not match.
    #[error("parse error at position {position}: {message}")]
    Parse {
        /// Description of the parse problem.
        message: String,
        /// Byte offset in the query text.
        position: usize,
    },

    /// Engine has not been started, or has been stopped.
    #[error("indexing engine is not started")]
    NotStarted,

    /// Engine was started twice.
    #[error("indexing engine is already started")]
    AlreadyStarted,

    /// Runtime context is shutting down.
    #[error("runtime context is stopping")]
    ContextStopping,

    /// Index structure corruption detected during a scan.
    #[error("index storage fault in type {type_name}: {message}")]
    StorageFault {
        /// Type whose index is damaged.
        type_name: String,
        /// Description of the fault.
        message: String,
    },

    /// Key is already indexed under another type and migration is disabled.
    #[error("key {key} already belongs to type {existing}, refusing to index it as {requested}")]
    TypeConflict {
        /// Rendered key.
        key: String,
        /// Type currently owning the key.
        existing: String,
        /// Type the store asked for.
        requested: String,
    },

    /// No component of the given kind is registered in the runtime context.
    #[error("no {0} component registered")]
    ComponentMissing(ComponentKind),

    /// A component of the given kind is already registered.
    #[error("a {0} component is already registered")]
    DuplicateComponent(ComponentKind),

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// Creates a storage fault error.
    pub fn storage_fault(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageFault {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(space: &crate::SpaceName, type_name: &str) -> Self {
        Self::schema(format!("type '{type_name}' is not registered in space {space}"))
    }

    /// Returns true if the error is a lifecycle error.
    ///
    /// Lifecycle errors affect the whole engine rather than one key or query.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::NotStarted | Self::AlreadyStarted | Self::ContextStopping
        )
    }
}

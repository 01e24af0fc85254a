//! JSON datasets.
//!
//! A dataset declares the types of one space and the cache entries to index:
//!
//! ```json
//! {
//!   "space": "people",
//!   "types": [
//!     {
//!       "name": "Person",
//!       "fields": [
//!         { "name": "age", "type": "integer", "indexed": true },
//!         { "name": "city", "type": "text", "path": ["address", "city"] }
//!       ],
//!       "text_fields": ["city"]
//!     }
//!   ],
//!   "entries": [
//!     { "type": "Person", "key": 1, "value": { "age": 30 }, "version": 1 }
//!   ]
//! }
//! ```

use gridix_core::{
    Component, CoreError, FieldDescriptor, FieldType, GridContext, IndexingConfig,
    IndexingEngine, MemoryCache, SpaceName, TypeDescriptor, Version,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file could not be read.
    #[error("cannot read dataset {path}: {source}")]
    Read {
        /// Dataset path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid dataset document.
    #[error("malformed dataset: {0}")]
    Json(#[from] serde_json::Error),

    /// A key or value cannot be represented.
    #[error("entry #{index}: {source}")]
    Value {
        /// Position of the entry in the dataset.
        index: usize,
        /// Underlying error.
        source: gridix_codec::CodecError,
    },

    /// An entry names a type the dataset does not declare.
    #[error("entry #{index} references undeclared type '{type_name}'")]
    UndeclaredType {
        /// Position of the entry in the dataset.
        index: usize,
        /// Referenced type.
        type_name: String,
    },

    /// The engine refused the dataset.
    #[error(transparent)]
    Engine(#[from] CoreError),
}

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    space: Option<String>,
    types: Vec<TypeSpec>,
    #[serde(default)]
    entries: Vec<EntrySpec>,
}

#[derive(Debug, Deserialize)]
struct TypeSpec {
    name: String,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    text_fields: Vec<String>,
    #[serde(default)]
    value_text: bool,
}

#[derive(Debug, Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type", default)]
    kind: FieldKind,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    indexed: bool,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FieldKind {
    Bool,
    Integer,
    Text,
    Bytes,
    #[default]
    Any,
}

impl From<FieldKind> for FieldType {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Bool => FieldType::Bool,
            FieldKind::Integer => FieldType::Integer,
            FieldKind::Text => FieldType::Text,
            FieldKind::Bytes => FieldType::Bytes,
            FieldKind::Any => FieldType::Any,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntrySpec {
    #[serde(rename = "type")]
    type_name: String,
    key: serde_json::Value,
    value: serde_json::Value,
    #[serde(default = "first_version")]
    version: u64,
    #[serde(default)]
    expires: u64,
}

fn first_version() -> u64 {
    1
}

impl TypeSpec {
    fn descriptor(&self) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(&self.name).value_text(self.value_text);
        for field in &self.fields {
            let mut built = FieldDescriptor::new(&field.name, field.kind.into());
            if !field.path.is_empty() {
                let path: Vec<&str> = field.path.iter().map(String::as_str).collect();
                built = built.at_path(&path);
            }
            if field.indexed {
                built = built.indexed();
            }
            descriptor = descriptor.field(built);
        }
        for name in &self.text_fields {
            descriptor = descriptor.text_field(name);
        }
        descriptor
    }
}

/// A started engine loaded with a dataset.
pub struct Session {
    /// The engine.
    pub engine: Arc<IndexingEngine>,
    /// The space the dataset lives in.
    pub space: SpaceName,
    types: Vec<TypeDescriptor>,
}

impl Session {
    /// Starts an engine and indexes the dataset at `path`.
    pub fn load(path: &Path, config: IndexingConfig) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, config)
    }

    /// Starts an engine and indexes a dataset document.
    pub fn from_json(text: &str, config: IndexingConfig) -> Result<Self, DatasetError> {
        let dataset: Dataset = serde_json::from_str(text)?;
        let space = dataset
            .space
            .as_deref()
            .map_or(SpaceName::DEFAULT, SpaceName::named);

        let context = Arc::new(GridContext::new("gridix-cli"));
        let cache = Arc::new(MemoryCache::new());
        context.components().add(Arc::clone(&cache) as Arc<dyn Component>)?;
        let engine = Arc::new(IndexingEngine::new(config));
        engine.start(context)?;

        // From here on, dropping the session stops the engine.
        let session = Self {
            engine,
            space,
            types: dataset.types.iter().map(TypeSpec::descriptor).collect(),
        };
        for descriptor in &session.types {
            session
                .engine
                .register_type(&session.space, descriptor.clone())?;
        }

        let mut indexed = 0usize;
        for (index, entry) in dataset.entries.iter().enumerate() {
            let descriptor = session.descriptor(&entry.type_name).ok_or_else(|| {
                DatasetError::UndeclaredType {
                    index,
                    type_name: entry.type_name.clone(),
                }
            })?;
            let key = gridix_codec::from_json(&entry.key)
                .map_err(|source| DatasetError::Value { index, source })?;
            let value = gridix_codec::from_json(&entry.value)
                .map_err(|source| DatasetError::Value { index, source })?;
            let version = Version::from_u64(entry.version);

            match session.engine.store(
                &session.space,
                descriptor,
                key.clone(),
                value.clone(),
                version.clone(),
                entry.expires,
            ) {
                Ok(true) => {
                    cache.put_expiring(&session.space, &descriptor.name, key, value, version, entry.expires);
                    indexed += 1;
                }
                Ok(false) => debug!(index, %key, "skipping stale dataset entry"),
                Err(err) => warn!(index, %key, error = %err, "skipping dataset entry"),
            }
        }

        info!(
            space = %session.space,
            types = session.types.len(),
            entries = indexed,
            "loaded dataset"
        );
        Ok(session)
    }

    /// Looks up a declared type, ignoring case.
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|descriptor| descriptor.name.eq_ignore_ascii_case(type_name))
    }

    /// Like [`descriptor`](Self::descriptor), failing for unknown types.
    pub fn require(&self, type_name: &str) -> Result<&TypeDescriptor, String> {
        self.descriptor(type_name)
            .ok_or_else(|| format!("type '{type_name}' is not declared in the dataset"))
    }

    /// Returns the declared types.
    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.engine.stop();
    }
}

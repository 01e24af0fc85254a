//! Query results.

use crate::context::{CacheSource, ComponentKind};
use crate::error::{CoreError, CoreResult};
use crate::index::IndexEntry;
use crate::query::cursor::EntryCursor;
use crate::query::plan::Column;
use crate::schema::FieldType;
use crate::types::SpaceName;
use gridix_codec::Value;
use std::fmt;
use std::sync::Arc;

/// Describes one column of a field query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Type the column was read from.
    pub type_name: String,
    /// Field name as declared, or `_key` / `_val`.
    pub field_name: String,
    /// Declared field type; `Any` for the pseudo fields.
    pub field_type: FieldType,
}

/// Reads the value of an entry, loading it from the cache when swapped out.
///
/// `Ok(None)` means the cache no longer holds the key.
fn value_of(
    space: &SpaceName,
    source: Option<&Arc<dyn CacheSource>>,
    entry: &IndexEntry,
) -> CoreResult<Option<Value>> {
    if let Some(value) = entry.value() {
        return Ok(Some(value.clone()));
    }
    match source {
        Some(source) => source.load(space, entry.key()),
        None => Err(CoreError::ComponentMissing(ComponentKind::Cache)),
    }
}

/// Streaming `(key, value)` rows of a row or text query.
///
/// Rows whose value was swapped out are loaded back from the cache on the
/// way out. Dropping the cursor releases the underlying scan.
pub struct RowCursor {
    entries: EntryCursor,
    space: SpaceName,
    source: Option<Arc<dyn CacheSource>>,
}

impl RowCursor {
    pub(crate) fn new(
        entries: EntryCursor,
        space: SpaceName,
        source: Option<Arc<dyn CacheSource>>,
    ) -> Self {
        Self {
            entries,
            space,
            source,
        }
    }

    /// Stops the query and releases its scan.
    pub fn close(&mut self) {
        self.entries.close();
    }
}

impl Iterator for RowCursor {
    type Item = CoreResult<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            match value_of(&self.space, self.source.as_ref(), &entry) {
                Ok(Some(value)) => return Some(Ok((entry.key().clone(), value))),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

/// Streaming rows of a field query, one value per selected column.
pub struct FieldsCursor {
    metadata: Vec<FieldMetadata>,
    columns: Vec<Column>,
    entries: EntryCursor,
    space: SpaceName,
    source: Option<Arc<dyn CacheSource>>,
}

impl FieldsCursor {
    pub(crate) fn new(
        metadata: Vec<FieldMetadata>,
        columns: Vec<Column>,
        entries: EntryCursor,
        space: SpaceName,
        source: Option<Arc<dyn CacheSource>>,
    ) -> Self {
        Self {
            metadata,
            columns,
            entries,
            space,
            source,
        }
    }

    /// Describes the columns of every row.
    pub fn metadata(&self) -> &[FieldMetadata] {
        &self.metadata
    }

    /// Stops the query and releases its scan.
    pub fn close(&mut self) {
        self.entries.close();
    }

    fn row(&self, entry: &IndexEntry) -> CoreResult<Option<Vec<Value>>> {
        let mut row = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = match column {
                Column::Value => match value_of(&self.space, self.source.as_ref(), entry)? {
                    Some(value) => value,
                    None => return Ok(None),
                },
                other => other.read(entry).cloned().unwrap_or(Value::Null),
            };
            row.push(value);
        }
        Ok(Some(row))
    }
}

impl Iterator for FieldsCursor {
    type Item = CoreResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            match self.row(&entry) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl fmt::Debug for FieldsCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldsCursor")
            .field("space", &self.space)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

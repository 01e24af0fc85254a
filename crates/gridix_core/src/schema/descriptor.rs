//! Type and field descriptors.

use crate::error::{CoreError, CoreResult};
use gridix_codec::Value;
use std::fmt;

/// Pseudo field naming the cache key.
pub const KEY_FIELD: &str = "_key";

/// Pseudo field naming the whole cache value.
pub const VALUE_FIELD: &str = "_val";

/// Semantic type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean field.
    Bool,
    /// Integer field.
    Integer,
    /// Text field.
    Text,
    /// Byte string field.
    Bytes,
    /// Field of any kind, compared by natural value order.
    Any,
}

impl FieldType {
    /// Returns true if `value` may be stored in a field of this type.
    ///
    /// `Null` is accepted by every type; it marks an absent field.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldType::Any, _) => true,
            (FieldType::Bool, Value::Bool(_))
            | (FieldType::Integer, Value::Integer(_))
            | (FieldType::Text, Value::Text(_))
            | (FieldType::Bytes, Value::Bytes(_)) => true,
            _ => false,
        }
    }

    /// Returns the type name.
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Text => "text",
            FieldType::Bytes => "bytes",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Describes one queryable field of a value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name used in queries.
    pub name: String,
    /// Path of map keys leading to the field inside the value.
    pub path: Vec<String>,
    /// Declared field type.
    pub field_type: FieldType,
    /// Whether an ordered index is maintained for this field.
    pub indexed: bool,
}

impl FieldDescriptor {
    /// Creates a non-indexed field read from the top-level key `name`.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            path: vec![name.clone()],
            name,
            field_type,
            indexed: false,
        }
    }

    /// Reads the field from a nested path instead of its own name.
    #[must_use]
    pub fn at_path(mut self, path: &[&str]) -> Self {
        self.path = path.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Maintains an ordered index for the field.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Describes one value type within a space.
///
/// A descriptor lists the fields extracted from every value of the type,
/// which of them have ordered indexes, and which feed the text index.
///
/// # Example
///
/// ```rust
/// use gridix_core::{FieldDescriptor, FieldType, TypeDescriptor};
///
/// let person = TypeDescriptor::new("Person")
///     .field(FieldDescriptor::new("name", FieldType::Text).indexed())
///     .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
///     .field(FieldDescriptor::new("bio", FieldType::Text))
///     .text_field("bio");
///
/// assert!(person.validate().is_ok());
/// assert_eq!(person.field_index("AGE"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Type name, matched case-insensitively.
    pub name: String,
    /// Declared fields, in projection order.
    pub fields: Vec<FieldDescriptor>,
    /// Names of declared fields feeding the text index.
    pub text_fields: Vec<String>,
    /// Index the text rendering of the whole value.
    pub value_text: bool,
}

impl TypeDescriptor {
    /// Creates a descriptor with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            text_fields: Vec::new(),
            value_text: false,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a declared field to the text index.
    #[must_use]
    pub fn text_field(mut self, name: impl Into<String>) -> Self {
        self.text_fields.push(name.into());
        self
    }

    /// Indexes the text rendering of the whole value.
    #[must_use]
    pub fn value_text(mut self, enabled: bool) -> Self {
        self.value_text = enabled;
        self
    }

    /// Returns the registry key for this type name.
    pub(crate) fn type_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Returns true if values of this type feed the text index.
    pub fn has_text(&self) -> bool {
        self.value_text || !self.text_fields.is_empty()
    }

    /// Returns the position of a declared field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Checks that the descriptor is well formed.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::schema("type name must not be empty"));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() || field.path.is_empty() {
                return Err(CoreError::schema(format!(
                    "field #{i} of type '{}' has an empty name or path",
                    self.name
                )));
            }
            if field.name.eq_ignore_ascii_case(KEY_FIELD)
                || field.name.eq_ignore_ascii_case(VALUE_FIELD)
            {
                return Err(CoreError::schema(format!(
                    "field name '{}' is reserved",
                    field.name
                )));
            }
            if self.field_index(&field.name) != Some(i) {
                return Err(CoreError::schema(format!(
                    "field '{}' is declared twice in type '{}'",
                    field.name, self.name
                )));
            }
        }
        for text in &self.text_fields {
            if self.field_index(text).is_none() {
                return Err(CoreError::schema(format!(
                    "text field '{text}' is not declared in type '{}'",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Extracts the declared fields from a value.
    ///
    /// Absent fields project to `Null`. A present value whose kind
    /// contradicts the declared type is a schema error.
    pub fn project(&self, value: &Value) -> CoreResult<Vec<Value>> {
        self.fields
            .iter()
            .map(|field| {
                let extracted = value.get_path(&field.path).cloned().unwrap_or(Value::Null);
                if field.field_type.accepts(&extracted) {
                    Ok(extracted)
                } else {
                    Err(CoreError::schema(format!(
                        "field '{}' of type '{}' expects {}, got {}",
                        field.name,
                        self.name,
                        field.field_type,
                        extracted.kind_name()
                    )))
                }
            })
            .collect()
    }

    /// Collects the text fragments indexed for a value.
    pub fn text_fragments(&self, fields: &[Value], value: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for name in &self.text_fields {
            if let Some(field) = self.field_index(name).and_then(|i| fields.get(i)) {
                field.collect_text(&mut out);
            }
        }
        if self.value_text {
            value.collect_text(&mut out);
        }
        out
    }
}

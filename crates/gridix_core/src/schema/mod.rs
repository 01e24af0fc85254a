//! Type schemas.
//!
//! Every space owns a set of [`TypeDescriptor`]s. A descriptor decides which
//! fields are extracted from a cache value, which of them are indexed, and
//! what text is fed to the text index.

mod descriptor;
mod registry;

pub use descriptor::{FieldDescriptor, FieldType, TypeDescriptor, KEY_FIELD, VALUE_FIELD};
pub use registry::{Registration, TypeRegistry};

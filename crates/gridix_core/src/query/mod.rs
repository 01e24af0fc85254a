//! Field, row and text queries.
//!
//! Field queries are `SELECT` statements over the declared fields of one
//! type; row queries take a clause and return `(key, value)` pairs; text
//! queries rank entries by the terms of the type's text index. All three
//! stream their results through cursors that read the index in batches and
//! never hold a lock between batches.

mod ast;
mod cursor;
mod executor;
mod filter;
mod parser;
mod plan;
mod result;

pub use filter::QueryFilter;
pub use result::{FieldMetadata, FieldsCursor, RowCursor};

pub(crate) use executor::{query_fields, query_rows, query_text, QueryContext};

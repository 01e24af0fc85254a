//! Index structures.
//!
//! Every registered (space, type) pair owns a type table holding:
//! - the entries of the type, keyed by cache key
//! - one ordered index per indexed field, for range and order access
//! - a text index when the type declares text-searchable content
//! - an expiry queue for entries with an expiration time
//!
//! The [`IndexStore`] routes mutations to the right table under the
//! version gate and hands tables out to queries.

mod btree;
mod entry;
mod fts;
mod store;
mod table;

pub use btree::ValueRange;
pub use entry::IndexEntry;
pub use fts::TokenizerConfig;
pub use store::TableInfo;

pub(crate) use store::IndexStore;
pub(crate) use fts::TermFreqs;
pub(crate) use table::{TableHandle, TypeTable};

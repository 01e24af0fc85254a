//! # Gridix Codec
//!
//! The dynamic value model shared by every Gridix crate.
//!
//! This crate provides:
//! - [`Value`]: keys, cache values and extracted field values
//! - A total natural ordering over values, used by ordered indexes
//! - CBOR conversion for value bytes handed over by the swap layer
//! - JSON conversion for datasets and tool output
//!
//! ## Usage
//!
//! ```
//! use gridix_codec::{from_cbor, to_cbor, Value};
//!
//! let person = Value::object([("name", Value::from("Ada")), ("age", Value::Integer(36))]);
//! let bytes = to_cbor(&person).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), person);
//! assert_eq!(person.get("age"), Some(&Value::Integer(36)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod json;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use json::{from_json, to_json};
pub use value::Value;

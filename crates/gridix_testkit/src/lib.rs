//! # Gridix Testkit
//!
//! Test utilities for the Gridix indexing engine.
//!
//! This crate provides:
//! - A started engine fixture wired to an in-memory cache and a manual clock
//! - Property-based test generators using proptest
//! - A model-checked integration harness
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use gridix_testkit::prelude::*;
//! use gridix_core::{SpaceName, Value};
//!
//! let grid = TestGrid::new();
//! let space = SpaceName::DEFAULT;
//! grid.register(&space, &person());
//! grid.put(&space, &person(), 7, person_value("ada", 36, "Oslo"), 1).unwrap();
//!
//! let rows = grid.select(&space, "SELECT name FROM Person WHERE age = 36", &[]);
//! assert_eq!(rows, vec![vec![Value::from("ada")]]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;

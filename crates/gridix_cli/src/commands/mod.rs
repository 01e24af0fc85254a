//! CLI command implementations.

pub mod dataset;
pub mod inspect;
pub mod query;
pub mod rebuild;

use clap::ValueEnum;

/// How command output is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

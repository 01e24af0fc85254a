//! Gridix CLI
//!
//! Loads a JSON dataset into an indexing engine and queries it.
//!
//! # Commands
//!
//! - `fields` - Run a `SELECT` statement
//! - `query` - Run a clause against one type and print `(key, value)` rows
//! - `text` - Run a text search against one type
//! - `size` - Count the live entries of a type
//! - `inspect` - Display index statistics
//! - `rebuild` - Rebuild indexes from the loaded cache

mod commands;

use clap::{Parser, Subcommand};
use commands::dataset::Session;
use commands::OutputFormat;
use gridix_core::IndexingConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gridix command-line query tool.
#[derive(Parser)]
#[command(name = "gridix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON dataset
    #[arg(global = true, short, long)]
    dataset: Option<PathBuf>,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Entries read per index lock acquisition
    #[arg(global = true, long)]
    batch: Option<usize>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SELECT statement
    Fields {
        /// The statement, e.g. "SELECT name FROM Person WHERE age > ?"
        sql: String,

        /// Positional parameter as a JSON literal (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Run a clause against one type
    Query {
        /// Type to query
        #[arg(short, long = "type")]
        type_name: String,

        /// The clause, e.g. "age > 30 ORDER BY name LIMIT 5"
        #[arg(default_value = "")]
        clause: String,

        /// Positional parameter as a JSON literal (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Run a text search against one type
    Text {
        /// Type to search
        #[arg(short, long = "type")]
        type_name: String,

        /// Search terms; a trailing `*` matches prefixes
        search: String,
    },

    /// Count the live entries of a type
    Size {
        /// Type to count
        #[arg(short, long = "type")]
        type_name: String,
    },

    /// Display index statistics
    Inspect,

    /// Rebuild indexes from the loaded cache
    Rebuild {
        /// Type to rebuild (all declared types if omitted)
        #[arg(short, long = "type")]
        type_name: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Gridix CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli.dataset.ok_or("Dataset path required (--dataset)")?;
    let mut config = IndexingConfig::default();
    if let Some(batch) = cli.batch {
        config = config.scan_batch_size(batch);
    }
    let session = Session::load(&path, config)?;
    let format = cli.format;

    match cli.command {
        Commands::Fields { sql, params } => {
            let params = commands::query::parse_params(&params)?;
            commands::query::fields(&session, &sql, &params, format)?;
        }
        Commands::Query {
            type_name,
            clause,
            params,
        } => {
            let params = commands::query::parse_params(&params)?;
            commands::query::query(&session, &type_name, &clause, &params, format)?;
        }
        Commands::Text { type_name, search } => {
            commands::query::text(&session, &type_name, &search, format)?;
        }
        Commands::Size { type_name } => {
            let descriptor = session.require(&type_name)?;
            let size = session.engine.size(&session.space, descriptor, None)?;
            println!("{size}");
        }
        Commands::Inspect => commands::inspect::run(&session, format)?,
        Commands::Rebuild { type_name } => {
            commands::rebuild::run(&session, type_name.as_deref(), format)?;
        }
        Commands::Version => {}
    }

    Ok(())
}

//! Inspect command implementation.

use super::dataset::Session;
use super::OutputFormat;
use serde::Serialize;

/// Index inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Space name, `null` for the default space.
    pub space: Option<String>,
    /// Per-type index statistics.
    pub types: Vec<TypeStats>,
    /// Engine counters.
    pub stats: EngineStats,
}

/// Statistics for a single type.
#[derive(Debug, Serialize)]
pub struct TypeStats {
    /// Type name.
    pub name: String,
    /// Entries held, including expired ones.
    pub entries: usize,
    /// Entries not expired.
    pub live_entries: usize,
    /// Entries per ordered field index.
    pub field_indexes: Vec<(String, usize)>,
    /// Entries with indexed text.
    pub text_entries: usize,
    /// Distinct tokens in the text index.
    pub text_tokens: usize,
}

/// Engine counters worth showing.
#[derive(Debug, Serialize)]
pub struct EngineStats {
    /// Applied stores.
    pub stores: u64,
    /// Stale stores discarded.
    pub stale_updates: u64,
    /// Keys moved between types.
    pub migrations: u64,
    /// Queries executed.
    pub queries: u64,
}

/// Runs the inspect command.
pub fn run(session: &Session, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = session.engine.stats().snapshot();
    let result = InspectResult {
        space: session.space.as_str().map(str::to_string),
        types: session
            .engine
            .inspect(&session.space)?
            .into_iter()
            .map(|info| TypeStats {
                name: info.type_name,
                entries: info.entries,
                live_entries: info.live_entries,
                field_indexes: info.field_indexes,
                text_entries: info.text_entries,
                text_tokens: info.text_tokens,
            })
            .collect(),
        stats: EngineStats {
            stores: snapshot.stores,
            stale_updates: snapshot.stale_updates,
            migrations: snapshot.migrations,
            queries: snapshot.queries,
        },
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Space: {}", result.space.as_deref().unwrap_or("<default>"));
    println!();
    for ty in &result.types {
        println!("Type {}", ty.name);
        println!("  Entries:      {} ({} live)", ty.entries, ty.live_entries);
        for (field, size) in &ty.field_indexes {
            println!("  Index {field:<8} {size}");
        }
        if ty.text_entries > 0 {
            println!("  Text:         {} entries, {} tokens", ty.text_entries, ty.text_tokens);
        }
    }
    println!();
    println!(
        "Stores: {}  Stale: {}  Migrations: {}  Queries: {}",
        result.stats.stores, result.stats.stale_updates, result.stats.migrations, result.stats.queries
    );
}

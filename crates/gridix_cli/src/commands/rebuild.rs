//! Rebuild command implementation.

use super::dataset::Session;
use super::OutputFormat;
use serde_json::json;

/// Rebuilds the indexes of one type, or of every declared type.
pub fn run(
    session: &Session,
    type_name: Option<&str>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptors = match type_name {
        Some(name) => vec![session.require(name)?.clone()],
        None => session.types().to_vec(),
    };

    let mut reports = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        reports.push(session.engine.rebuild_indexes(&session.space, descriptor)?);
    }

    match format {
        OutputFormat::Text => {
            for report in &reports {
                println!(
                    "{}: {} indexed, {} skipped, {} dropped, {} reconciled",
                    report.type_name, report.indexed, report.skipped, report.dropped, report.reconciled
                );
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = reports
                .iter()
                .map(|r| {
                    json!({
                        "type": r.type_name,
                        "indexed": r.indexed,
                        "skipped": r.skipped,
                        "dropped": r.dropped,
                        "reconciled": r.reconciled,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

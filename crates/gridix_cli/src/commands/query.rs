//! Field, row and text query commands.

use super::dataset::Session;
use super::OutputFormat;
use gridix_codec::{to_json, Value};
use serde_json::{json, Map};

/// Parses `--param` arguments; each one is a JSON literal.
pub fn parse_params(raw: &[String]) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    raw.iter()
        .map(|text| -> Result<Value, Box<dyn std::error::Error>> {
            let json: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| format!("parameter {text:?} is not a JSON literal: {e}"))?;
            Ok(gridix_codec::from_json(&json)?)
        })
        .collect()
}

/// Runs a `SELECT` statement and prints the selected columns.
pub fn fields(
    session: &Session,
    sql: &str,
    params: &[Value],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let cursor = session
        .engine
        .query_fields(&session.space, sql, params, None)?;
    let names: Vec<String> = cursor
        .metadata()
        .iter()
        .map(|column| column.field_name.clone())
        .collect();

    match format {
        OutputFormat::Text => {
            println!("{}", names.join("\t"));
            let mut count = 0usize;
            for row in cursor {
                let row = row?;
                let cells: Vec<String> = row.iter().map(Value::to_string).collect();
                println!("{}", cells.join("\t"));
                count += 1;
            }
            println!("({count} rows)");
        }
        OutputFormat::Json => {
            let mut rows = Vec::new();
            for row in cursor {
                let object: Map<String, serde_json::Value> = names
                    .iter()
                    .cloned()
                    .zip(row?.iter().map(to_json))
                    .collect();
                rows.push(serde_json::Value::Object(object));
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// Runs a row or text query and prints `(key, value)` rows.
pub fn rows(
    cursor: gridix_core::RowCursor,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => {
            let mut count = 0usize;
            for row in cursor {
                let (key, value) = row?;
                println!("{key}\t{value}");
                count += 1;
            }
            println!("({count} rows)");
        }
        OutputFormat::Json => {
            let mut rows = Vec::new();
            for row in cursor {
                let (key, value) = row?;
                rows.push(json!({ "key": to_json(&key), "value": to_json(&value) }));
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

/// Runs a clause against one type.
pub fn query(
    session: &Session,
    type_name: &str,
    clause: &str,
    params: &[Value],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = session.require(type_name)?;
    let cursor = session
        .engine
        .query(&session.space, clause, params, descriptor, None)?;
    rows(cursor, format)
}

/// Runs a text search against one type.
pub fn text(
    session: &Session,
    type_name: &str,
    search: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = session.require(type_name)?;
    let cursor = session
        .engine
        .query_text(&session.space, search, descriptor, None)?;
    rows(cursor, format)
}

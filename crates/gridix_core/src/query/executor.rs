//! Query execution: parse, bind, plan, open a cursor.

use crate::context::{CacheSource, Clock};
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexStore, TableHandle};
use crate::query::ast::{Selection, Statement};
use crate::query::cursor::{EntryCursor, EntrySource, RankedCursor, ScanCursor, ScanEnv};
use crate::query::filter::QueryFilter;
use crate::query::parser::{parse_clause, parse_select};
use crate::query::plan::{bind, sort_entries, Column, Plan};
use crate::query::result::{FieldMetadata, FieldsCursor, RowCursor};
use crate::schema::TypeDescriptor;
use crate::stats::IndexingStats;
use crate::types::SpaceName;
use gridix_codec::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Everything a query needs from the running engine.
pub(crate) struct QueryContext {
    pub(crate) space: SpaceName,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) stats: Arc<IndexingStats>,
    pub(crate) source: Option<Arc<dyn CacheSource>>,
    pub(crate) filter: Option<Arc<dyn QueryFilter>>,
    pub(crate) batch: usize,
}

impl QueryContext {
    fn env(&self) -> ScanEnv {
        ScanEnv {
            space: self.space.clone(),
            clock: Arc::clone(&self.clock),
            stats: Arc::clone(&self.stats),
            filter: self.filter.clone(),
            batch: self.batch,
        }
    }
}

/// Runs a `SELECT` statement, returning the selected columns.
pub(crate) fn query_fields(
    store: &IndexStore,
    cx: QueryContext,
    text: &str,
    params: &[Value],
) -> CoreResult<FieldsCursor> {
    let statement = parse_select(text)?;
    check_params(&statement, params)?;
    let type_name = statement.type_name.clone().unwrap_or_default();
    let (handle, descriptor) = open(store, &cx.space, &type_name)?;

    let columns: Vec<Column> = match &statement.selection {
        Some(Selection::Fields(names)) => names
            .iter()
            .map(|name| Column::resolve(&descriptor, name))
            .collect::<CoreResult<_>>()?,
        _ => std::iter::once(Column::Key)
            .chain((0..descriptor.fields.len()).map(Column::Field))
            .collect(),
    };
    let metadata = columns
        .iter()
        .map(|column| FieldMetadata {
            type_name: descriptor.name.clone(),
            field_name: column.name(&descriptor),
            field_type: column.field_type(&descriptor),
        })
        .collect();

    let entries = execute(handle, &descriptor, &statement, params, &cx)?;
    cx.stats.record_query();
    debug!(space = %cx.space, type_name = %descriptor.name, "opened field query");
    Ok(FieldsCursor::new(metadata, columns, entries, cx.space, cx.source))
}

/// Runs a clause against one type, returning `(key, value)` rows.
pub(crate) fn query_rows(
    store: &IndexStore,
    cx: QueryContext,
    type_name: &str,
    text: &str,
    params: &[Value],
) -> CoreResult<RowCursor> {
    let statement = parse_clause(text)?;
    check_params(&statement, params)?;
    if let Some(named) = &statement.type_name {
        if !named.eq_ignore_ascii_case(type_name) {
            return Err(CoreError::schema(format!(
                "query reads type '{named}' but was issued for '{type_name}'"
            )));
        }
    }
    let (handle, descriptor) = open(store, &cx.space, type_name)?;

    let entries = execute(handle, &descriptor, &statement, params, &cx)?;
    cx.stats.record_query();
    debug!(space = %cx.space, type_name = %descriptor.name, "opened row query");
    Ok(RowCursor::new(entries, cx.space, cx.source))
}

/// Runs a text search against one type; rows come best match first.
pub(crate) fn query_text(
    store: &IndexStore,
    cx: QueryContext,
    type_name: &str,
    text: &str,
) -> CoreResult<RowCursor> {
    let (handle, descriptor) = open(store, &cx.space, type_name)?;
    if !descriptor.has_text() {
        return Err(CoreError::schema(format!(
            "type '{}' has no text-searchable content",
            descriptor.name
        )));
    }

    let terms = store.tokenizer().query_terms(text);
    let ranked = handle.read().search_text(&terms);
    let ranked = match ranked {
        Ok(ranked) => ranked,
        Err(err) => {
            cx.stats.record_storage_fault();
            warn!(space = %cx.space, type_name = %descriptor.name, error = %err, "text index storage fault");
            return Err(err);
        }
    };
    trace!(space = %cx.space, type_name = %descriptor.name, matches = ranked.len(), "ranked text query");

    let keys = ranked.into_iter().map(|(key, _)| key).collect();
    let cursor = RankedCursor::new(handle, descriptor.name.clone(), keys, cx.env());
    cx.stats.record_query();
    Ok(RowCursor::new(
        EntryCursor::new(EntrySource::Ranked(cursor), 0, None),
        cx.space,
        cx.source,
    ))
}

fn check_params(statement: &Statement, params: &[Value]) -> CoreResult<()> {
    if statement.params == params.len() {
        Ok(())
    } else {
        Err(CoreError::parse(
            format!(
                "query has {} parameter(s) but {} value(s) were supplied",
                statement.params,
                params.len()
            ),
            0,
        ))
    }
}

fn open(
    store: &IndexStore,
    space: &SpaceName,
    type_name: &str,
) -> CoreResult<(TableHandle, Arc<TypeDescriptor>)> {
    let handle = store.require_table(space, type_name)?;
    let descriptor = {
        let table = handle.read();
        if table.is_dropped() {
            return Err(CoreError::unknown_type(space, type_name));
        }
        Arc::clone(table.descriptor())
    };
    Ok((handle, descriptor))
}

fn execute(
    handle: TableHandle,
    descriptor: &TypeDescriptor,
    statement: &Statement,
    params: &[Value],
    cx: &QueryContext,
) -> CoreResult<EntryCursor> {
    let condition = statement
        .filter
        .as_ref()
        .map(|expr| bind(expr, descriptor, params))
        .transpose()?;
    let order = statement
        .order_by
        .as_ref()
        .map(|order| Column::resolve(descriptor, &order.field).map(|c| (c, order.descending)))
        .transpose()?;
    let offset = usize::try_from(statement.offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = statement
        .limit
        .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX));

    let plan = Plan::new(descriptor, condition, order, offset, limit);
    trace!(access = ?plan.access, descending = plan.descending, sorted = plan.sort.is_some(), "planned query");

    let scan = ScanCursor::new(
        handle,
        descriptor.name.clone(),
        plan.access,
        plan.descending,
        plan.condition,
        cx.env(),
    );
    let source = match plan.sort {
        None => EntrySource::Scan(scan),
        Some((column, descending)) => {
            let mut entries = scan.collect::<CoreResult<Vec<_>>>()?;
            sort_entries(&mut entries, column, descending);
            EntrySource::Sorted(entries.into_iter())
        }
    };
    Ok(EntryCursor::new(source, plan.offset, plan.limit))
}

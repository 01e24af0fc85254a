//! Batched index cursors.
//!
//! A cursor never holds a table lock between batches. Each refill takes the
//! table read lock, copies out up to `batch` entries past the last position
//! seen, and releases the lock; expiry, visibility filters and predicates
//! run on the copied entries. Because positions are values, not slots, a
//! cursor survives concurrent updates: it sees each key at most once, in
//! whatever state the key had when its batch was read.

use crate::context::Clock;
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexEntry, TableHandle};
use crate::query::filter::QueryFilter;
use crate::query::plan::{Access, Condition};
use crate::stats::IndexingStats;
use crate::types::SpaceName;
use gridix_codec::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// What a cursor needs besides the table.
#[derive(Clone)]
pub(crate) struct ScanEnv {
    pub(crate) space: SpaceName,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) stats: Arc<IndexingStats>,
    pub(crate) filter: Option<Arc<dyn QueryFilter>>,
    pub(crate) batch: usize,
}

impl ScanEnv {
    fn visible(&self, entry: &IndexEntry, now: u64) -> bool {
        !entry.is_expired(now)
            && self
                .filter
                .as_ref()
                .map_or(true, |filter| filter.accepts(&self.space, entry.key()))
    }

    fn batch(&self) -> usize {
        self.batch.max(1)
    }

    fn unregistered(&self, type_name: &str) -> CoreError {
        CoreError::schema(format!(
            "type '{type_name}' in space {} was unregistered during the query",
            self.space
        ))
    }

    fn report(&self, err: &CoreError) {
        if let CoreError::StorageFault { type_name, message } = err {
            self.stats.record_storage_fault();
            warn!(space = %self.space, type_name = %type_name, %message, "index storage fault during scan");
        }
    }
}

/// Keeps the open-scan counter balanced: closes once, on demand or on drop.
struct ScanToken {
    stats: Option<Arc<IndexingStats>>,
}

impl ScanToken {
    fn open(stats: &Arc<IndexingStats>) -> Self {
        stats.record_scan_opened();
        Self {
            stats: Some(Arc::clone(stats)),
        }
    }

    fn close(&mut self) {
        if let Some(stats) = self.stats.take() {
            stats.record_scan_closed();
        }
    }
}

impl Drop for ScanToken {
    fn drop(&mut self) {
        self.close();
    }
}

/// Last position returned by an index walk.
enum Position {
    Key(Value),
    Field(Value, Value),
}

/// Walks one access path of a table in batches.
pub(crate) struct ScanCursor {
    table: Option<TableHandle>,
    type_name: String,
    access: Access,
    descending: bool,
    condition: Option<Condition>,
    env: ScanEnv,
    position: Option<Position>,
    buffer: VecDeque<Arc<IndexEntry>>,
    token: ScanToken,
}

impl ScanCursor {
    pub(crate) fn new(
        table: TableHandle,
        type_name: String,
        access: Access,
        descending: bool,
        condition: Option<Condition>,
        env: ScanEnv,
    ) -> Self {
        let token = ScanToken::open(&env.stats);
        Self {
            table: Some(table),
            type_name,
            access,
            descending,
            condition,
            env,
            position: None,
            buffer: VecDeque::new(),
            token,
        }
    }

    fn key_position(&self) -> Option<&Value> {
        match &self.position {
            Some(Position::Key(key)) => Some(key),
            _ => None,
        }
    }

    fn field_position(&self) -> Option<(&Value, &Value)> {
        match &self.position {
            Some(Position::Field(field, key)) => Some((field, key)),
            _ => None,
        }
    }

    fn fill(&mut self) -> CoreResult<()> {
        while self.buffer.is_empty() {
            let Some(handle) = &self.table else {
                return Ok(());
            };

            let batch = {
                let table = handle.read();
                if table.is_dropped() {
                    Err(self.env.unregistered(&self.type_name))
                } else {
                    match &self.access {
                        Access::Keys(range) => table.scan_keys(
                            range,
                            self.key_position(),
                            self.descending,
                            self.env.batch(),
                        ),
                        Access::Field { field, range } => table.scan_field(
                            *field,
                            range,
                            self.field_position(),
                            self.descending,
                            self.env.batch(),
                        ),
                    }
                }
            };

            let batch = match batch {
                Ok(batch) => batch,
                Err(err) => {
                    self.env.report(&err);
                    self.release();
                    return Err(err);
                }
            };

            let exhausted = batch.len() < self.env.batch();
            if let Some(last) = batch.last() {
                self.position = Some(match &self.access {
                    Access::Keys(_) => Position::Key(last.key().clone()),
                    Access::Field { field, .. } => Position::Field(
                        last.field(*field).cloned().unwrap_or(Value::Null),
                        last.key().clone(),
                    ),
                });
            }

            let now = self.env.clock.now_millis();
            for entry in batch {
                let admitted = self
                    .condition
                    .as_ref()
                    .map_or(true, |condition| condition.matches(&entry));
                if admitted && self.env.visible(&entry, now) {
                    self.buffer.push_back(entry);
                }
            }

            if exhausted {
                self.release();
            }
        }
        Ok(())
    }

    /// Drops the table handle; buffered entries stay readable.
    fn release(&mut self) {
        self.table = None;
        self.token.close();
    }

    pub(crate) fn close(&mut self) {
        self.release();
        self.buffer.clear();
    }
}

impl Iterator for ScanCursor {
    type Item = CoreResult<Arc<IndexEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.fill() {
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Fetches entries for a list of keys ranked by a text search.
pub(crate) struct RankedCursor {
    table: Option<TableHandle>,
    type_name: String,
    keys: VecDeque<Value>,
    env: ScanEnv,
    buffer: VecDeque<Arc<IndexEntry>>,
    token: ScanToken,
}

impl RankedCursor {
    pub(crate) fn new(table: TableHandle, type_name: String, keys: Vec<Value>, env: ScanEnv) -> Self {
        let token = ScanToken::open(&env.stats);
        Self {
            table: Some(table),
            type_name,
            keys: keys.into(),
            env,
            buffer: VecDeque::new(),
            token,
        }
    }

    fn fill(&mut self) -> CoreResult<()> {
        while self.buffer.is_empty() {
            let Some(handle) = &self.table else {
                return Ok(());
            };
            if self.keys.is_empty() {
                self.release();
                return Ok(());
            }

            let take = self.env.batch().min(self.keys.len());
            let keys: Vec<Value> = self.keys.drain(..take).collect();
            let batch = {
                let table = handle.read();
                if table.is_dropped() {
                    Err(self.env.unregistered(&self.type_name))
                } else {
                    Ok(keys
                        .iter()
                        .filter_map(|key| table.get(key).cloned())
                        .collect::<Vec<_>>())
                }
            };

            let batch = match batch {
                Ok(batch) => batch,
                Err(err) => {
                    self.release();
                    return Err(err);
                }
            };

            let now = self.env.clock.now_millis();
            self.buffer
                .extend(batch.into_iter().filter(|entry| self.env.visible(entry, now)));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.table = None;
        self.keys.clear();
        self.token.close();
    }

    pub(crate) fn close(&mut self) {
        self.release();
        self.buffer.clear();
    }
}

impl Iterator for RankedCursor {
    type Item = CoreResult<Arc<IndexEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.fill() {
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Where an entry cursor draws from.
pub(crate) enum EntrySource {
    Scan(ScanCursor),
    Ranked(RankedCursor),
    /// Entries materialized and sorted at open time.
    Sorted(std::vec::IntoIter<Arc<IndexEntry>>),
}

/// Applies `OFFSET` and `LIMIT` to an entry source.
pub(crate) struct EntryCursor {
    source: EntrySource,
    skip: usize,
    remaining: Option<usize>,
}

impl EntryCursor {
    pub(crate) fn new(source: EntrySource, offset: usize, limit: Option<usize>) -> Self {
        Self {
            source,
            skip: offset,
            remaining: limit,
        }
    }

    pub(crate) fn close(&mut self) {
        match &mut self.source {
            EntrySource::Scan(scan) => scan.close(),
            EntrySource::Ranked(ranked) => ranked.close(),
            EntrySource::Sorted(entries) => *entries = Vec::new().into_iter(),
        }
        self.remaining = Some(0);
    }
}

impl Iterator for EntryCursor {
    type Item = CoreResult<Arc<IndexEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                self.close();
                return None;
            }

            let item = match &mut self.source {
                EntrySource::Scan(scan) => scan.next(),
                EntrySource::Ranked(ranked) => ranked.next(),
                EntrySource::Sorted(entries) => entries.next().map(Ok),
            }?;

            match item {
                Err(err) => return Some(Err(err)),
                Ok(_) if self.skip > 0 => self.skip -= 1,
                Ok(entry) => {
                    if let Some(remaining) = &mut self.remaining {
                        *remaining -= 1;
                    }
                    return Some(Ok(entry));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualClock;
    use crate::index::{TypeTable, ValueRange};
    use crate::schema::{FieldDescriptor, FieldType, TypeDescriptor};
    use crate::types::Version;
    use parking_lot::RwLock;

    fn table(keys: std::ops::RangeInclusive<i64>) -> TableHandle {
        let descriptor = TypeDescriptor::new("Item")
            .field(FieldDescriptor::new("qty", FieldType::Integer).indexed());
        let mut table = TypeTable::new(Arc::new(descriptor));
        for key in keys {
            let entry = IndexEntry::new(
                Value::Integer(key),
                vec![Value::Integer(key % 3)],
                Value::Integer(key),
                Version::from_u64(1),
                if key == 4 { 10 } else { 0 },
            );
            table.upsert(Arc::new(entry), Default::default());
        }
        Arc::new(RwLock::new(table))
    }

    fn env(stats: &Arc<IndexingStats>, batch: usize) -> ScanEnv {
        ScanEnv {
            space: SpaceName::DEFAULT,
            clock: Arc::new(ManualClock::new(100)),
            stats: Arc::clone(stats),
            filter: None,
            batch,
        }
    }

    fn keys(cursor: impl Iterator<Item = CoreResult<Arc<IndexEntry>>>) -> Vec<i64> {
        cursor
            .map(|entry| entry.unwrap().key().as_integer().unwrap())
            .collect()
    }

    #[test]
    fn scan_resumes_across_batches_and_skips_expired() {
        let stats = Arc::new(IndexingStats::new());
        let cursor = ScanCursor::new(
            table(1..=7),
            "Item".into(),
            Access::Keys(ValueRange::all()),
            false,
            None,
            env(&stats, 2),
        );
        assert_eq!(stats.open_scans(), 1);
        assert_eq!(keys(cursor), vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(stats.open_scans(), 0);
    }

    #[test]
    fn field_scan_descending() {
        let stats = Arc::new(IndexingStats::new());
        let cursor = ScanCursor::new(
            table(1..=6),
            "Item".into(),
            Access::Field {
                field: 0,
                range: ValueRange::all(),
            },
            true,
            None,
            env(&stats, 1),
        );
        // qty = key % 3, ties in key order reversed; key 4 is expired.
        assert_eq!(keys(cursor), vec![5, 2, 1, 6, 3]);
    }

    #[test]
    fn scan_sees_concurrent_inserts_past_its_position() {
        let stats = Arc::new(IndexingStats::new());
        let handle = table(1..=3);
        let mut cursor = ScanCursor::new(
            Arc::clone(&handle),
            "Item".into(),
            Access::Keys(ValueRange::all()),
            false,
            None,
            env(&stats, 1),
        );
        assert_eq!(cursor.next().unwrap().unwrap().key(), &Value::Integer(1));

        let late = IndexEntry::new(Value::Integer(9), vec![Value::Integer(0)], Value::Null, Version::from_u64(1), 0);
        handle.write().upsert(Arc::new(late), Default::default());
        handle.write().remove(&Value::Integer(2));

        assert_eq!(keys(cursor), vec![3, 9]);
    }

    #[test]
    fn dropped_table_ends_scan_with_one_error() {
        let stats = Arc::new(IndexingStats::new());
        let handle = table(1..=3);
        let mut cursor = ScanCursor::new(
            Arc::clone(&handle),
            "Item".into(),
            Access::Keys(ValueRange::all()),
            false,
            None,
            env(&stats, 1),
        );
        assert!(cursor.next().unwrap().is_ok());
        handle.write().drop_all();

        assert!(matches!(cursor.next(), Some(Err(CoreError::Schema { .. }))));
        assert!(cursor.next().is_none());
        assert_eq!(stats.open_scans(), 0);
    }

    #[test]
    fn corrupted_index_reports_storage_fault() {
        let stats = Arc::new(IndexingStats::new());
        let handle = table(1..=3);
        handle.write().corrupt(&Value::Integer(2));
        let cursor = ScanCursor::new(
            handle,
            "Item".into(),
            Access::Field {
                field: 0,
                range: ValueRange::all(),
            },
            false,
            None,
            env(&stats, 8),
        );

        let results: Vec<_> = cursor.collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CoreError::StorageFault { .. })));
        assert_eq!(stats.snapshot().storage_faults, 1);
    }

    #[test]
    fn offset_and_limit_close_the_scan_early() {
        let stats = Arc::new(IndexingStats::new());
        let scan = ScanCursor::new(
            table(1..=7),
            "Item".into(),
            Access::Keys(ValueRange::all()),
            false,
            None,
            env(&stats, 2),
        );
        let mut cursor = EntryCursor::new(EntrySource::Scan(scan), 1, Some(2));
        assert_eq!(keys(&mut cursor), vec![2, 3]);
        assert_eq!(stats.open_scans(), 0);
    }

    #[test]
    fn ranked_cursor_skips_vanished_and_filtered_keys() {
        let stats = Arc::new(IndexingStats::new());
        let mut env = env(&stats, 2);
        env.filter = Some(Arc::new(|_: &SpaceName, key: &Value| key != &Value::Integer(3)));
        let cursor = RankedCursor::new(
            table(1..=5),
            "Item".into(),
            vec![Value::Integer(5), Value::Integer(42), Value::Integer(3), Value::Integer(1)],
            env,
        );
        assert_eq!(keys(cursor), vec![5, 1]);
        assert_eq!(stats.open_scans(), 0);
    }

    #[test]
    fn dropping_an_open_cursor_closes_it() {
        let stats = Arc::new(IndexingStats::new());
        let mut cursor = ScanCursor::new(
            table(1..=7),
            "Item".into(),
            Access::Keys(ValueRange::all()),
            false,
            None,
            env(&stats, 2),
        );
        cursor.next();
        assert_eq!(stats.open_scans(), 1);
        drop(cursor);
        assert_eq!(stats.open_scans(), 0);
    }
}

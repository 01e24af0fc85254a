//! Index structures of one (space, type) pair.

use crate::error::{CoreError, CoreResult};
use crate::index::btree::{range_iter, OrderedIndex, ValueRange};
use crate::index::entry::{IndexEntry, Slot};
use crate::index::fts::{QueryTerm, TermFreqs, TextIndex};
use crate::schema::TypeDescriptor;
use crate::types::NEVER_EXPIRES;
use gridix_codec::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Shared handle to a type table.
pub(crate) type TableHandle = Arc<RwLock<TypeTable>>;

/// All index structures of one type.
///
/// Entries live in an arena addressed by [`Slot`]; the key map, the ordered
/// field indexes, the text index and the expiry queue refer to slots.
#[derive(Debug)]
pub(crate) struct TypeTable {
    descriptor: Arc<TypeDescriptor>,
    arena: Vec<Option<Arc<IndexEntry>>>,
    free: Vec<Slot>,
    keys: BTreeMap<Value, Slot>,
    /// One ordered index per indexed field, by descriptor position.
    fields: Vec<Option<OrderedIndex>>,
    text: TextIndex,
    expiry: BTreeSet<(u64, Slot)>,
    mutations: u64,
    dropped: bool,
    /// Keys mutated since a rebuild began.
    touched: Option<HashSet<Value>>,
}

impl TypeTable {
    pub(crate) fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        let fields = descriptor
            .fields
            .iter()
            .map(|f| f.indexed.then(OrderedIndex::new))
            .collect();
        Self {
            descriptor,
            arena: Vec::new(),
            free: Vec::new(),
            keys: BTreeMap::new(),
            fields,
            text: TextIndex::new(),
            expiry: BTreeSet::new(),
            mutations: 0,
            dropped: false,
            touched: None,
        }
    }

    pub(crate) fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.descriptor.name
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped
    }

    /// Empties the table and marks it unusable, returning the keys it held.
    pub(crate) fn drop_all(&mut self) -> Vec<Value> {
        let keys = std::mem::take(&mut self.keys).into_keys().collect();
        let descriptor = Arc::clone(&self.descriptor);
        *self = Self::new(descriptor);
        self.dropped = true;
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Number of entries not expired at `now`.
    pub(crate) fn live_count(&self, now: u64) -> usize {
        let expired = self.expiry.range(..=(now, Slot::MAX)).count();
        self.keys.len().saturating_sub(expired)
    }

    pub(crate) fn get(&self, key: &Value) -> Option<&Arc<IndexEntry>> {
        let slot = self.keys.get(key)?;
        self.arena.get(*slot).and_then(Option::as_ref)
    }

    pub(crate) fn contains(&self, key: &Value) -> bool {
        self.keys.contains_key(key)
    }

    /// Returns an entry with the text terms it was indexed with.
    pub(crate) fn export(&self, key: &Value) -> Option<(Arc<IndexEntry>, TermFreqs)> {
        let slot = *self.keys.get(key)?;
        let entry = self.arena.get(slot).and_then(Option::as_ref)?;
        let terms = self.text.terms(slot).cloned().unwrap_or_default();
        Some((Arc::clone(entry), terms))
    }

    /// Returns the text terms indexed for a key.
    pub(crate) fn terms(&self, key: &Value) -> Option<&TermFreqs> {
        self.keys.get(key).and_then(|slot| self.text.terms(*slot))
    }

    /// Iterates entries in key order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<IndexEntry>> + '_ {
        self.keys
            .values()
            .filter_map(|slot| self.arena.get(*slot).and_then(Option::as_ref))
    }

    /// Installs an entry, replacing the one held for the same key.
    pub(crate) fn upsert(&mut self, entry: Arc<IndexEntry>, terms: TermFreqs) -> Option<Arc<IndexEntry>> {
        let key = entry.key().clone();
        self.touch(&key);
        self.mutations += 1;

        let (slot, previous) = match self.keys.get(&key).copied() {
            Some(slot) => {
                let previous = self.arena.get_mut(slot).and_then(Option::take);
                if let Some(prev) = &previous {
                    self.unlink(slot, prev);
                }
                (slot, previous)
            }
            None => {
                let slot = self.allocate();
                self.keys.insert(key.clone(), slot);
                (slot, None)
            }
        };

        for (index, field) in self.fields.iter_mut().zip(entry.fields()) {
            if let Some(index) = index {
                index.insert(field.clone(), key.clone(), slot);
            }
        }
        if entry.expiration_time() != NEVER_EXPIRES {
            self.expiry.insert((entry.expiration_time(), slot));
        }
        self.text.insert(slot, terms);
        self.arena[slot] = Some(entry);
        previous
    }

    /// Removes the entry of a key.
    pub(crate) fn remove(&mut self, key: &Value) -> Option<Arc<IndexEntry>> {
        self.touch(key);
        self.mutations += 1;

        let slot = self.keys.remove(key)?;
        let entry = self.arena.get_mut(slot).and_then(Option::take);
        if let Some(entry) = &entry {
            self.unlink(slot, entry);
        }
        self.text.remove(slot);
        self.free.push(slot);
        entry
    }

    /// Replaces the entry of a key without touching any index.
    ///
    /// Only valid when the projection (fields, version, expiry) is unchanged,
    /// i.e. for swap and unswap.
    pub(crate) fn replace_resident(&mut self, entry: IndexEntry) -> bool {
        let Some(slot) = self.keys.get(entry.key()).copied() else {
            return false;
        };
        match self.arena.get_mut(slot) {
            Some(cell) if cell.is_some() => {
                *cell = Some(Arc::new(entry));
                true
            }
            _ => false,
        }
    }

    fn allocate(&mut self) -> Slot {
        if let Some(slot) = self.free.pop() {
            slot
        } else {
            self.arena.push(None);
            self.arena.len() - 1
        }
    }

    fn unlink(&mut self, slot: Slot, entry: &IndexEntry) {
        for (index, field) in self.fields.iter_mut().zip(entry.fields()) {
            if let Some(index) = index {
                index.remove(field, entry.key());
            }
        }
        if entry.expiration_time() != NEVER_EXPIRES {
            self.expiry.remove(&(entry.expiration_time(), slot));
        }
    }

    fn touch(&mut self, key: &Value) {
        if let Some(touched) = &mut self.touched {
            touched.insert(key.clone());
        }
    }

    /// Starts recording mutated keys.
    pub(crate) fn begin_journal(&mut self) {
        self.touched = Some(HashSet::new());
    }

    /// Stops recording and returns the keys mutated since `begin_journal`.
    pub(crate) fn take_journal(&mut self) -> HashSet<Value> {
        self.touched.take().unwrap_or_default()
    }

    /// Takes the journal, leaving the table unjournaled.
    pub(crate) fn journal_state(&mut self) -> Option<HashSet<Value>> {
        self.touched.take()
    }

    pub(crate) fn set_journal(&mut self, journal: Option<HashSet<Value>>) {
        self.touched = journal;
    }

    /// Returns true when the mutation counter hits the sweep interval.
    pub(crate) fn sweep_due(&self, interval: u64) -> bool {
        interval != 0 && self.mutations % interval == 0
    }

    /// Removes every entry expired at `now`, returning their keys.
    pub(crate) fn purge_expired(&mut self, now: u64) -> Vec<Value> {
        let slots: Vec<Slot> = self
            .expiry
            .range(..=(now, Slot::MAX))
            .map(|(_, slot)| *slot)
            .collect();
        let keys: Vec<Value> = slots
            .into_iter()
            .filter_map(|slot| self.arena.get(slot).and_then(Option::as_ref))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    fn entry_at(&self, slot: Slot, key: &Value) -> CoreResult<&Arc<IndexEntry>> {
        self.arena
            .get(slot)
            .and_then(Option::as_ref)
            .filter(|entry| entry.key() == key)
            .ok_or_else(|| {
                CoreError::storage_fault(
                    self.type_name(),
                    format!("index points to empty slot {slot} for key {key}"),
                )
            })
    }

    /// Returns up to `limit` entries in key order.
    pub(crate) fn scan_keys(
        &self,
        range: &ValueRange,
        after: Option<&Value>,
        descending: bool,
        limit: usize,
    ) -> CoreResult<Vec<Arc<IndexEntry>>> {
        let range = match after {
            Some(key) => range
                .clone()
                .intersect(&ValueRange::resume(key, descending, false)),
            None => range.clone(),
        };
        range_iter(&self.keys, &range, descending)
            .take(limit)
            .map(|(key, slot)| self.entry_at(*slot, key).map(Arc::clone))
            .collect()
    }

    /// Returns up to `limit` entries in the order of an indexed field.
    pub(crate) fn scan_field(
        &self,
        field: usize,
        range: &ValueRange,
        after: Option<(&Value, &Value)>,
        descending: bool,
        limit: usize,
    ) -> CoreResult<Vec<Arc<IndexEntry>>> {
        let index = self
            .fields
            .get(field)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                CoreError::storage_fault(self.type_name(), format!("field #{field} has no index"))
            })?;

        index
            .scan(range, after, descending, limit)
            .into_iter()
            .map(|(value, key, slot)| {
                let entry = self.entry_at(slot, &key)?;
                if entry.field(field) != Some(&value) {
                    return Err(CoreError::storage_fault(
                        self.type_name(),
                        format!("field index out of sync for key {key}"),
                    ));
                }
                Ok(Arc::clone(entry))
            })
            .collect()
    }

    /// Ranks entries matching a text query.
    ///
    /// Results are ordered by score (descending), then key.
    pub(crate) fn search_text(&self, terms: &[QueryTerm]) -> CoreResult<Vec<(Value, u32)>> {
        let mut ranked = self
            .text
            .search(terms)
            .into_iter()
            .map(|(slot, score)| {
                self.arena
                    .get(slot)
                    .and_then(Option::as_ref)
                    .map(|entry| (entry.key().clone(), score))
                    .ok_or_else(|| {
                        CoreError::storage_fault(
                            self.type_name(),
                            format!("text index points to empty slot {slot}"),
                        )
                    })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }

    /// Sizes of the per-field indexes, in descriptor order.
    pub(crate) fn index_sizes(&self) -> Vec<(String, usize)> {
        self.descriptor
            .fields
            .iter()
            .zip(&self.fields)
            .filter_map(|(field, index)| index.as_ref().map(|i| (field.name.clone(), i.len())))
            .collect()
    }

    pub(crate) fn text_stats(&self) -> (usize, usize) {
        (self.text.entry_count(), self.text.unique_token_count())
    }

    /// Empties a slot without unlinking it, simulating a damaged index.
    #[cfg(test)]
    pub(crate) fn corrupt(&mut self, key: &Value) {
        if let Some(slot) = self.keys.get(key).copied() {
            self.arena[slot] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fts::Tokenizer;
    use crate::schema::{FieldDescriptor, FieldType};
    use crate::types::Version;
    use std::ops::Bound;

    fn descriptor() -> Arc<TypeDescriptor> {
        Arc::new(
            TypeDescriptor::new("Person")
                .field(FieldDescriptor::new("name", FieldType::Text))
                .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
                .text_field("name"),
        )
    }

    fn insert(table: &mut TypeTable, key: i64, name: &str, age: i64, exp: u64) {
        let value = Value::object([("name", Value::from(name)), ("age", Value::Integer(age))]);
        let fields = table.descriptor().project(&value).unwrap();
        let terms = Tokenizer::default()
            .term_frequencies(&table.descriptor().text_fragments(&fields, &value));
        let entry = IndexEntry::new(Value::Integer(key), fields, value, Version::from_u64(1), exp);
        table.upsert(Arc::new(entry), terms);
    }

    fn ages(entries: &[Arc<IndexEntry>]) -> Vec<i64> {
        entries
            .iter()
            .filter_map(|e| e.field(1).and_then(Value::as_integer))
            .collect()
    }

    #[test]
    fn upsert_replaces_index_positions() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "ada", 30, 0);
        insert(&mut table, 1, "ada", 31, 0);

        assert_eq!(table.len(), 1);
        let old = table
            .scan_field(1, &ValueRange::point(Value::Integer(30)), None, false, 10)
            .unwrap();
        assert!(old.is_empty());
        let new = table
            .scan_field(1, &ValueRange::point(Value::Integer(31)), None, false, 10)
            .unwrap();
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn slots_are_reused() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "a", 1, 0);
        table.remove(&Value::Integer(1));
        insert(&mut table, 2, "b", 2, 0);
        assert_eq!(table.arena.len(), 1);
        assert_eq!(table.get(&Value::Integer(2)).unwrap().key(), &Value::Integer(2));
    }

    #[test]
    fn field_scan_in_batches() {
        let mut table = TypeTable::new(descriptor());
        for (key, age) in [(1, 40), (2, 20), (3, 30), (4, 20)] {
            insert(&mut table, key, "x", age, 0);
        }
        let range = ValueRange::new(Bound::Included(Value::Integer(20)), Bound::Unbounded);
        let first = table.scan_field(1, &range, None, false, 2).unwrap();
        assert_eq!(ages(&first), vec![20, 20]);

        let last = first.last().unwrap();
        let rest = table
            .scan_field(1, &range, Some((last.field(1).unwrap(), last.key())), false, 2)
            .unwrap();
        assert_eq!(ages(&rest), vec![30, 40]);
    }

    #[test]
    fn key_scan_resumes_after_removed_key() {
        let mut table = TypeTable::new(descriptor());
        for key in 1..=4 {
            insert(&mut table, key, "x", key, 0);
        }
        let first = table.scan_keys(&ValueRange::all(), None, false, 2).unwrap();
        table.remove(&Value::Integer(2));
        let rest = table
            .scan_keys(&ValueRange::all(), Some(first[1].key()), false, 10)
            .unwrap();
        assert_eq!(ages(&rest), vec![3, 4]);
    }

    #[test]
    fn expiry_purge_and_live_count() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "a", 1, 100);
        insert(&mut table, 2, "b", 2, 0);
        insert(&mut table, 3, "c", 3, 200);

        assert_eq!(table.live_count(50), 3);
        assert_eq!(table.live_count(150), 2);

        let purged = table.purge_expired(150);
        assert_eq!(purged, vec![Value::Integer(1)]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn text_search_ranks_by_score_then_key() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 2, "rust", 1, 0);
        insert(&mut table, 1, "rust", 1, 0);
        insert(&mut table, 3, "rust rust", 1, 0);

        let ranked = table
            .search_text(&Tokenizer::default().query_terms("rust"))
            .unwrap();
        let keys: Vec<_> = ranked.iter().map(|(k, _)| k.as_integer().unwrap()).collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }

    #[test]
    fn corrupted_slot_is_a_storage_fault() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "a", 1, 0);
        table.corrupt(&Value::Integer(1));

        let err = table.scan_keys(&ValueRange::all(), None, false, 10).unwrap_err();
        assert!(matches!(err, CoreError::StorageFault { .. }));
        let err = table.scan_field(1, &ValueRange::all(), None, false, 10).unwrap_err();
        assert!(matches!(err, CoreError::StorageFault { .. }));
    }

    #[test]
    fn journal_records_mutated_keys() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "a", 1, 0);
        table.begin_journal();
        insert(&mut table, 2, "b", 2, 0);
        table.remove(&Value::Integer(9));

        let touched = table.take_journal();
        assert!(touched.contains(&Value::Integer(2)));
        assert!(touched.contains(&Value::Integer(9)));
        assert!(!touched.contains(&Value::Integer(1)));
    }

    #[test]
    fn drop_all_returns_keys() {
        let mut table = TypeTable::new(descriptor());
        insert(&mut table, 1, "a", 1, 0);
        insert(&mut table, 2, "b", 2, 0);
        let keys = table.drop_all();
        assert_eq!(keys.len(), 2);
        assert!(table.is_dropped());
        assert_eq!(table.len(), 0);
    }
}

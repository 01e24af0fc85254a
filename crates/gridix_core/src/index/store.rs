//! Index store: the type tables of every space and the mutation protocol.
//!
//! # Locking
//!
//! Mutations take locks in a fixed order: the key's gate stripe, then the
//! table map, then one type table. Queries only take table read locks.
//! Schema operations release the table lock before touching the gate.

use crate::config::{IndexingConfig, TypeMigrationPolicy};
use crate::error::{CoreError, CoreResult};
use crate::gate::VersionGate;
use crate::index::entry::IndexEntry;
use crate::index::fts::{TermFreqs, Tokenizer};
use crate::index::table::{TableHandle, TypeTable};
use crate::query::QueryFilter;
use crate::schema::TypeDescriptor;
use crate::stats::IndexingStats;
use crate::types::{SpaceName, Version};
use gridix_codec::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Fields and text terms extracted from one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Projection {
    pub(crate) fields: Vec<Value>,
    pub(crate) terms: TermFreqs,
}

/// Summary of one type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Registered type name.
    pub type_name: String,
    /// Entries held, including expired ones not yet purged.
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

/// Index structures of every registered type.
#[derive(Debug)]
pub(crate) struct IndexStore {
    tables: RwLock<HashMap<(SpaceName, String), TableHandle>>,
    gate: VersionGate,
    tokenizer: Tokenizer,
    config: IndexingConfig,
    stats: Arc<IndexingStats>,
}

impl IndexStore {
    pub(crate) fn new(config: IndexingConfig, stats: Arc<IndexingStats>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            gate: VersionGate::new(config.gate_shards),
            tokenizer: Tokenizer::new(config.tokenizer.clone()),
            config,
            stats,
        }
    }

    pub(crate) fn gate(&self) -> &VersionGate {
        &self.gate
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn stats(&self) -> &IndexingStats {
        &self.stats
    }

    pub(crate) fn table(&self, space: &SpaceName, type_name: &str) -> Option<TableHandle> {
        self.tables
            .read()
            .get(&(space.clone(), type_name.to_lowercase()))
            .cloned()
    }

    pub(crate) fn require_table(&self, space: &SpaceName, type_name: &str) -> CoreResult<TableHandle> {
        self.table(space, type_name)
            .ok_or_else(|| CoreError::unknown_type(space, type_name))
    }

    fn tables_in(&self, space: &SpaceName) -> Vec<TableHandle> {
        self.tables
            .read()
            .iter()
            .filter(|((s, _), _)| s == space)
            .map(|(_, handle)| Arc::clone(handle))
            .collect()
    }

    /// Extracts fields and text terms from a value.
    pub(crate) fn project(&self, descriptor: &TypeDescriptor, value: &Value) -> CoreResult<Projection> {
        let fields = descriptor.project(value)?;
        let terms = if descriptor.has_text() {
            self.tokenizer
                .term_frequencies(&descriptor.text_fragments(&fields, value))
        } else {
            TermFreqs::new()
        };
        Ok(Projection { fields, terms })
    }

    /// Creates the table of a newly registered type.
    pub(crate) fn create_table(&self, space: &SpaceName, descriptor: Arc<TypeDescriptor>) {
        let key = (space.clone(), descriptor.type_key());
        let table = Arc::new(RwLock::new(TypeTable::new(descriptor)));
        self.tables.write().insert(key, table);
    }

    /// Drops the table of an unregistered type and forgets its keys.
    ///
    /// Cursors still holding the table see it as dropped.
    pub(crate) fn drop_table(&self, space: &SpaceName, type_name: &str) -> usize {
        let Some(handle) = self
            .tables
            .write()
            .remove(&(space.clone(), type_name.to_lowercase()))
        else {
            return 0;
        };
        let keys = handle.write().drop_all();

        for key in &keys {
            let mut guard = self.gate.lock(space, key);
            let owned = guard
                .owner()
                .is_some_and(|owner| owner.eq_ignore_ascii_case(type_name));
            let reindexed = self
                .table(space, type_name)
                .is_some_and(|table| table.read().contains(key));
            if owned && !reindexed {
                guard.forget();
            }
        }
        keys.len()
    }

    /// Installs a new descriptor for a registered type and re-projects its
    /// entries.
    ///
    /// Swapped-out entries are re-projected from `load`. Entries whose value
    /// is gone, or no longer fits the descriptor, are dropped.
    pub(crate) fn replace_descriptor(
        &self,
        space: &SpaceName,
        descriptor: Arc<TypeDescriptor>,
        load: &dyn Fn(&Value) -> CoreResult<Option<Value>>,
    ) -> CoreResult<(usize, usize)> {
        let handle = self.require_table(space, &descriptor.name)?;
        let mut dropped = Vec::new();
        let mut kept = 0;
        {
            let mut table = handle.write();
            let mut fresh = TypeTable::new(Arc::clone(&descriptor));
            for entry in table.entries() {
                let value = match entry.value() {
                    Some(value) => Some(value.clone()),
                    None => load(entry.key())?,
                };
                let projected = value.and_then(|value| {
                    self.project(&descriptor, &value).ok().map(|p| (value, p))
                });
                match projected {
                    Some((value, projection)) => {
                        let entry = IndexEntry::new(
                            entry.key().clone(),
                            projection.fields,
                            value,
                            entry.version().clone(),
                            entry.expiration_time(),
                        );
                        fresh.upsert(Arc::new(entry), projection.terms);
                        kept += 1;
                    }
                    None => dropped.push(entry.key().clone()),
                }
            }
            // An in-flight rebuild keeps its journal and sees the new descriptor.
            fresh.set_journal(table.journal_state());
            *table = fresh;
        }

        for key in &dropped {
            let mut guard = self.gate.lock(space, key);
            let owned = guard
                .owner()
                .is_some_and(|owner| owner.eq_ignore_ascii_case(&descriptor.name));
            if owned && !handle.read().contains(key) {
                guard.apply_remove();
            }
        }
        if !dropped.is_empty() {
            warn!(
                %space,
                type_name = %descriptor.name,
                dropped = dropped.len(),
                "entries dropped while re-projecting type"
            );
        }
        Ok((kept, dropped.len()))
    }

    /// Indexes a value under a type.
    ///
    /// Returns false if the version gate discarded the store as stale.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn store(
        &self,
        space: &SpaceName,
        type_name: &str,
        key: Value,
        value: Value,
        version: Version,
        expiration_time: u64,
        now: u64,
    ) -> CoreResult<bool> {
        let handle = self.require_table(space, type_name)?;
        let descriptor = Arc::clone(handle.read().descriptor());
        let mut projection = self.project(&descriptor, &value)?;

        let mut guard = self.gate.lock(space, &key);
        if !guard.accepts(&version) {
            self.stats.record_stale_update();
            trace!(%space, %key, %version, "discarding stale store");
            return Ok(false);
        }

        if let Some(previous) = guard.owner() {
            if !previous.eq_ignore_ascii_case(&descriptor.name) {
                match self.config.type_migration {
                    TypeMigrationPolicy::Reject => {
                        self.stats.record_rejected_migration();
                        warn!(%space, %key, existing = %previous, requested = %descriptor.name, "refusing type migration");
                        return Err(CoreError::TypeConflict {
                            key: key.to_string(),
                            existing: previous.to_string(),
                            requested: descriptor.name.clone(),
                        });
                    }
                    TypeMigrationPolicy::Migrate => {
                        if handle.read().is_dropped() {
                            return Err(CoreError::unknown_type(space, type_name));
                        }
                        if let Some(old) = self.table(space, &previous) {
                            old.write().remove(&key);
                        }
                        self.stats.record_migration();
                        debug!(%space, %key, from = %previous, to = %descriptor.name, "migrating key");
                    }
                }
            }
        }

        let purged = {
            let mut table = handle.write();
            if table.is_dropped() {
                return Err(CoreError::unknown_type(space, type_name));
            }
            if !Arc::ptr_eq(table.descriptor(), &descriptor) {
                projection = self.project(table.descriptor(), &value)?;
            }
            let owner: Arc<str> = Arc::from(table.type_name());
            let entry = IndexEntry::new(
                key,
                projection.fields,
                value,
                version.clone(),
                expiration_time,
            );
            table.upsert(Arc::new(entry), projection.terms);
            guard.apply_store(version, owner);

            if table.sweep_due(self.config.expiry_sweep_interval) {
                table.purge_expired(now).len()
            } else {
                0
            }
        };
        drop(guard);

        self.stats.record_store();
        if purged > 0 {
            self.stats.record_expired(purged);
            debug!(%space, type_name, purged, "purged expired entries");
        }
        Ok(true)
    }

    /// Removes a key from every type of its space and tombstones it.
    pub(crate) fn remove(&self, space: &SpaceName, key: &Value) -> bool {
        let mut guard = self.gate.lock(space, key);
        let mut removed = false;
        for handle in self.tables_in(space) {
            removed |= handle.write().remove(key).is_some();
        }
        guard.apply_remove();
        drop(guard);

        self.stats.record_remove();
        removed
    }

    /// Counts the live entries of a type visible through `filter`.
    pub(crate) fn size(
        &self,
        space: &SpaceName,
        type_name: &str,
        filter: Option<&dyn QueryFilter>,
        now: u64,
    ) -> Option<usize> {
        let handle = self.table(space, type_name)?;
        let table = handle.read();
        if table.is_dropped() {
            return None;
        }
        Some(match filter {
            None => table.live_count(now),
            Some(filter) => table
                .entries()
                .filter(|entry| !entry.is_expired(now) && filter.accepts(space, entry.key()))
                .count(),
        })
    }

    /// Purges expired entries of every type in a space.
    pub(crate) fn purge_expired(&self, space: &SpaceName, now: u64) -> usize {
        let purged: usize = self
            .tables_in(space)
            .iter()
            .map(|handle| handle.write().purge_expired(now).len())
            .sum();
        self.stats.record_expired(purged);
        purged
    }

    /// Describes every table of a space, sorted by type name.
    pub(crate) fn inspect(&self, space: &SpaceName, now: u64) -> Vec<TableInfo> {
        let mut infos: Vec<TableInfo> = self
            .tables_in(space)
            .iter()
            .map(|handle| {
                let table = handle.read();
                let (text_entries, text_tokens) = table.text_stats();
                TableInfo {
                    type_name: table.type_name().to_string(),
                    entries: table.len(),
                    live_entries: table.live_count(now),
                    field_indexes: table.index_sizes(),
                    text_entries,
                    text_tokens,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        infos
    }

    /// Drops every table and forgets every key.
    pub(crate) fn clear(&self) {
        let tables: Vec<TableHandle> = self.tables.write().drain().map(|(_, t)| t).collect();
        for table in tables {
            table.write().drop_all();
        }
        self.gate.clear();
    }
}

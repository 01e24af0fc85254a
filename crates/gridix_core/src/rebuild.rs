//! Index rebuild from the authoritative cache.
//!
//! A rebuild reads every entry of a type from the [`CacheSource`], builds a
//! fresh type table next to the live one, and swaps it in under the table's
//! write lock. Writes that land while the fresh table is being built are
//! journaled by the live table and copied over at swap time, so the result
//! converges on the source plus every concurrent write.

use crate::context::CacheSource;
use crate::error::{CoreError, CoreResult};
use crate::gate::KeyState;
use crate::index::{IndexEntry, IndexStore, TableHandle, TypeTable};
use crate::index::TermFreqs;
use crate::schema::TypeDescriptor;
use crate::types::{SpaceName, Version};
use gridix_codec::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Rebuilt type.
    pub type_name: String,
    /// Entries in the index once the rebuild completed.
    pub indexed: usize,
    /// Source entries whose value does not fit the descriptor.
    pub skipped: usize,
    /// Entries indexed before the rebuild and absent from the source.
    pub dropped: usize,
    /// Keys taken from the live index because they changed concurrently or
    /// carry a newer version than the source.
    pub reconciled: usize,
}

impl IndexStore {
    /// Re-derives every entry of a type from `source`.
    pub(crate) fn rebuild(
        &self,
        space: &SpaceName,
        type_name: &str,
        source: &dyn CacheSource,
    ) -> CoreResult<RebuildReport> {
        let handle = self.require_table(space, type_name)?;
        let descriptor = {
            let mut table = handle.write();
            if table.is_dropped() {
                return Err(CoreError::unknown_type(space, type_name));
            }
            table.begin_journal();
            Arc::clone(table.descriptor())
        };

        let result = self.rebuild_into(space, &handle, &descriptor, source);
        if result.is_err() {
            handle.write().take_journal();
        } else {
            self.stats().record_rebuild();
        }
        result
    }

    fn rebuild_into(
        &self,
        space: &SpaceName,
        handle: &TableHandle,
        descriptor: &Arc<TypeDescriptor>,
        source: &dyn CacheSource,
    ) -> CoreResult<RebuildReport> {
        let owner: Arc<str> = Arc::from(descriptor.name.as_str());
        let mut fresh = TypeTable::new(Arc::clone(descriptor));
        let mut from_live: HashSet<Value> = HashSet::new();
        let mut applied: Vec<AppliedStore> = Vec::new();
        let mut report = RebuildReport {
            type_name: descriptor.name.clone(),
            ..RebuildReport::default()
        };

        for entry in source.entries(space, &descriptor.name)? {
            let projection = match self.project(descriptor, &entry.value) {
                Ok(projection) => projection,
                Err(err) => {
                    warn!(%space, key = %entry.key, error = %err, "skipping source entry");
                    report.skipped += 1;
                    continue;
                }
            };

            let mut guard = self.gate().lock(space, &entry.key);
            match guard.state() {
                Some(KeyState::Live { version, owner: current }) if *version > entry.version => {
                    if current.eq_ignore_ascii_case(&descriptor.name) {
                        from_live.insert(entry.key.clone());
                    }
                    continue;
                }
                Some(KeyState::Removed { version }) if *version >= entry.version => continue,
                _ => {}
            }
            let mut migrated = None;
            if let Some(previous) = guard.owner() {
                if !previous.eq_ignore_ascii_case(&descriptor.name) {
                    if let Some(other) = self.table(space, &previous) {
                        let mut table = other.write();
                        let taken = table.export(&entry.key);
                        table.remove(&entry.key);
                        let kept_descriptor = Arc::clone(table.descriptor());
                        drop(table);
                        migrated = taken.map(|(entry, terms)| Migrated {
                            table: other,
                            descriptor: kept_descriptor,
                            entry,
                            terms,
                        });
                    }
                }
            }
            applied.push(AppliedStore {
                key: entry.key.clone(),
                version: entry.version.clone(),
                prior: guard.state().cloned(),
                migrated,
            });
            guard.apply_store(entry.version.clone(), Arc::clone(&owner));
            drop(guard);

            let indexed = IndexEntry::new(
                entry.key,
                projection.fields,
                entry.value,
                entry.version,
                entry.expiration_time,
            );
            fresh.upsert(Arc::new(indexed), projection.terms);
        }

        let dropped = match Self::swap_in(space, handle, descriptor, fresh, &from_live, &mut report) {
            Ok(dropped) => dropped,
            Err(err) => {
                self.roll_back(space, &owner, applied);
                return Err(err);
            }
        };

        for key in &dropped {
            let mut guard = self.gate().lock(space, key);
            let owned = guard
                .owner()
                .is_some_and(|current| current.eq_ignore_ascii_case(&descriptor.name));
            if owned && !handle.read().contains(key) {
                guard.apply_remove();
            }
        }
        report.dropped = dropped.len();
        Ok(report)
    }

    /// Replaces the live table with `fresh`, carrying over keys written
    /// while the rebuild ran. Returns the keys the live table lost.
    fn swap_in(
        space: &SpaceName,
        handle: &TableHandle,
        descriptor: &Arc<TypeDescriptor>,
        mut fresh: TypeTable,
        from_live: &HashSet<Value>,
        report: &mut RebuildReport,
    ) -> CoreResult<Vec<Value>> {
        let mut table = handle.write();
        if table.is_dropped() {
            return Err(CoreError::unknown_type(space, &descriptor.name));
        }
        if !Arc::ptr_eq(table.descriptor(), descriptor) {
            return Err(CoreError::invalid_operation(format!(
                "type '{}' was re-registered during the rebuild",
                descriptor.name
            )));
        }

        let touched = table.take_journal();
        for key in touched.iter().chain(from_live.iter()) {
            match table.export(key) {
                Some((entry, terms)) => {
                    fresh.upsert(entry, terms);
                }
                None => {
                    fresh.remove(key);
                }
            }
            report.reconciled += 1;
        }

        let dropped: Vec<Value> = table
            .entries()
            .map(|entry| entry.key().clone())
            .filter(|key| !fresh.contains(key))
            .collect();
        report.indexed = fresh.len();
        *table = fresh;
        Ok(dropped)
    }

    /// Undoes the gate advances and migrations of a rebuild that could not
    /// swap its table in. Keys written since the rebuild touched them are
    /// left alone.
    fn roll_back(&self, space: &SpaceName, owner: &Arc<str>, applied: Vec<AppliedStore>) {
        let mut restored = 0usize;
        for store in applied.into_iter().rev() {
            let mut guard = self.gate().lock(space, &store.key);
            let untouched = matches!(
                guard.state(),
                Some(KeyState::Live { version, owner: current })
                    if *version == store.version && Arc::ptr_eq(current, owner)
            );
            if !untouched {
                continue;
            }
            match store.migrated {
                Some(migrated) => {
                    let mut table = migrated.table.write();
                    if !table.is_dropped() && Arc::ptr_eq(table.descriptor(), &migrated.descriptor) {
                        table.upsert(migrated.entry, migrated.terms);
                        guard.restore(store.prior);
                    } else {
                        guard.forget();
                    }
                }
                None => guard.restore(store.prior),
            }
            restored += 1;
        }
        if restored > 0 {
            debug!(%space, type_name = %owner, restored, "rolled back aborted rebuild");
        }
    }
}

/// A gate advance made by a rebuild before its swap.
struct AppliedStore {
    key: Value,
    version: Version,
    prior: Option<KeyState>,
    migrated: Option<Migrated>,
}

/// An entry a rebuild took from the table of another type.
struct Migrated {
    table: TableHandle,
    descriptor: Arc<TypeDescriptor>,
    entry: Arc<IndexEntry>,
    terms: TermFreqs,
}

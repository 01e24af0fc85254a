//! Swap synchronization.
//!
//! Swapping a value out to secondary storage keeps its index entry: only the
//! resident value is dropped, so field queries keep seeing the projection.
//! Unswap brings the value back and re-derives the projection when it no
//! longer matches.

use crate::error::CoreResult;
use crate::index::{IndexEntry, IndexStore};
use crate::types::SpaceName;
use gridix_codec::Value;
use std::sync::Arc;
use tracing::debug;

/// What an unswap notification did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnswapOutcome {
    /// The key is not indexed.
    Missing,
    /// The entry already matched the value.
    Unchanged,
    /// The value was made resident again; the projection was unchanged.
    Restored,
    /// The projection differed and was re-derived from the value.
    Refreshed,
}

impl IndexStore {
    /// Marks the value of a key as swapped out.
    ///
    /// Returns false if the key is not indexed or already swapped out.
    pub(crate) fn on_swap(&self, space: &SpaceName, key: &Value) -> bool {
        let guard = self.gate().lock(space, key);
        let Some(handle) = guard.owner().and_then(|owner| self.table(space, &owner)) else {
            return false;
        };

        let swapped = {
            let mut table = handle.write();
            match table.get(key).cloned() {
                Some(entry) if entry.is_resident() => table.replace_resident(entry.swapped()),
                _ => false,
            }
        };
        drop(guard);

        if swapped {
            self.stats().record_swap();
        }
        swapped
    }

    /// Reconciles the entry of a key with a value reloaded from swap.
    pub(crate) fn on_unswap(
        &self,
        space: &SpaceName,
        key: &Value,
        value: Value,
    ) -> CoreResult<UnswapOutcome> {
        let guard = self.gate().lock(space, key);
        let Some(handle) = guard.owner().and_then(|owner| self.table(space, &owner)) else {
            return Ok(UnswapOutcome::Missing);
        };

        let descriptor = Arc::clone(handle.read().descriptor());
        let mut projection = self.project(&descriptor, &value)?;

        let outcome = {
            let mut table = handle.write();
            let Some(entry) = table.get(key).cloned() else {
                return Ok(UnswapOutcome::Missing);
            };
            if !Arc::ptr_eq(table.descriptor(), &descriptor) {
                projection = self.project(table.descriptor(), &value)?;
            }

            let same_terms = table
                .terms(key)
                .map_or(projection.terms.is_empty(), |terms| *terms == projection.terms);
            if entry.fields() == projection.fields.as_slice() && same_terms {
                if entry.value() == Some(&value) {
                    UnswapOutcome::Unchanged
                } else {
                    table.replace_resident(entry.with_value(value));
                    UnswapOutcome::Restored
                }
            } else {
                let refreshed = IndexEntry::new(
                    key.clone(),
                    projection.fields,
                    value,
                    entry.version().clone(),
                    entry.expiration_time(),
                );
                table.upsert(Arc::new(refreshed), projection.terms);
                UnswapOutcome::Refreshed
            }
        };
        drop(guard);

        self.stats()
            .record_unswap(outcome == UnswapOutcome::Refreshed);
        if outcome == UnswapOutcome::Refreshed {
            debug!(%space, %key, "re-derived index entry on unswap");
        }
        Ok(outcome)
    }

    /// Like [`on_unswap`](Self::on_unswap), with the value in its CBOR encoding.
    pub(crate) fn on_unswap_bytes(
        &self,
        space: &SpaceName,
        key: &Value,
        bytes: &[u8],
    ) -> CoreResult<UnswapOutcome> {
        let value = gridix_codec::from_cbor(bytes)?;
        self.on_unswap(space, key, value)
    }
}

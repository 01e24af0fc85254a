//! Indexing statistics.
//!
//! Counters for monitoring index maintenance and query traffic.
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = engine.stats().snapshot();
//! println!("stale updates discarded: {}", stats.stale_updates);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Indexing statistics.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct IndexingStats {
    stores: AtomicU64,
    removes: AtomicU64,
    /// Stores discarded by the version gate.
    stale_updates: AtomicU64,
    /// Stores refused because the key belongs to another type.
    rejected_migrations: AtomicU64,
    /// Keys moved from one type to another.
    migrations: AtomicU64,
    swaps: AtomicU64,
    unswaps: AtomicU64,
    /// Unswaps that had to re-derive the index entry.
    unswap_refreshes: AtomicU64,
    queries: AtomicU64,
    scans_opened: AtomicU64,
    scans_closed: AtomicU64,
    storage_faults: AtomicU64,
    rebuilds: AtomicU64,
    expired_purged: AtomicU64,
}

impl IndexingStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_update(&self) {
        self.stale_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_migration(&self) {
        self.rejected_migrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swap(&self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unswap(&self, refreshed: bool) {
        self.unswaps.fetch_add(1, Ordering::Relaxed);
        if refreshed {
            self.unswap_refreshes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_opened(&self) {
        self.scans_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_closed(&self) {
        self.scans_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_storage_fault(&self) {
        self.storage_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self, count: usize) {
        self.expired_purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Returns the number of applied stores.
    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    /// Returns the number of removes.
    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Returns the number of stale stores discarded by the version gate.
    pub fn stale_updates(&self) -> u64 {
        self.stale_updates.load(Ordering::Relaxed)
    }

    /// Returns the number of scans currently open.
    pub fn open_scans(&self) -> u64 {
        self.scans_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.scans_closed.load(Ordering::Relaxed))
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            stores: self.stores(),
            removes: self.removes(),
            stale_updates: self.stale_updates(),
            rejected_migrations: self.rejected_migrations.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
            swaps: self.swaps.load(Ordering::Relaxed),
            unswaps: self.unswaps.load(Ordering::Relaxed),
            unswap_refreshes: self.unswap_refreshes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            scans_opened: self.scans_opened.load(Ordering::Relaxed),
            scans_closed: self.scans_closed.load(Ordering::Relaxed),
            storage_faults: self.storage_faults.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            expired_purged: self.expired_purged.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of indexing statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Applied stores.
    pub stores: u64,
    /// Removes.
    pub removes: u64,
    /// Stale stores discarded by the version gate.
    pub stale_updates: u64,
    /// Stores refused because the key belongs to another type.
    pub rejected_migrations: u64,
    /// Keys moved between types.
    pub migrations: u64,
    /// Swap notifications.
    pub swaps: u64,
    /// Unswap notifications.
    pub unswaps: u64,
    /// Unswaps that re-derived the index entry.
    pub unswap_refreshes: u64,
    /// Queries executed.
    pub queries: u64,
    /// Cursors opened.
    pub scans_opened: u64,
    /// Cursors closed.
    pub scans_closed: u64,
    /// Scans aborted by index corruption.
    pub storage_faults: u64,
    /// Completed rebuilds.
    pub rebuilds: u64,
    /// Expired entries purged.
    pub expired_purged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = IndexingStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn open_scans_tracks_balance() {
        let stats = IndexingStats::new();
        stats.record_scan_opened();
        stats.record_scan_opened();
        stats.record_scan_closed();
        assert_eq!(stats.open_scans(), 1);
    }

    #[test]
    fn unswap_refreshes_counted_separately() {
        let stats = IndexingStats::new();
        stats.record_unswap(false);
        stats.record_unswap(true);
        let snap = stats.snapshot();
        assert_eq!(snap.unswaps, 2);
        assert_eq!(snap.unswap_refreshes, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(IndexingStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_store();
                        s.record_stale_update();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.stores(), 800);
        assert_eq!(stats.stale_updates(), 800);
    }
}

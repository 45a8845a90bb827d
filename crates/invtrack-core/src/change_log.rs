//! Per-table version counters recording committed write activity.
//!
//! The table universe is fixed at construction. Each table owns one
//! `AtomicU64` incremented exactly once per committed write touching
//! it, so counters are totally ordered per table and never decrease.
//! Cross-table atomicity is deliberately not provided; consumers
//! compare snapshots table by table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use invtrack_error::{Result, TrackError};
use smallvec::SmallVec;
use tracing::trace;

// ---------------------------------------------------------------------------
// VersionSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of all table counters, indexed by table id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    versions: Box<[u64]>,
}

impl VersionSnapshot {
    /// All-zero snapshot for a universe of `table_count` tables.
    #[must_use]
    pub fn zeroed(table_count: usize) -> Self {
        Self {
            versions: vec![0; table_count].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn from_versions(versions: Vec<u64>) -> Self {
        Self {
            versions: versions.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Counter value for table `index`, or 0 if out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> u64 {
        self.versions.get(index).copied().unwrap_or(0)
    }

    /// Table indices whose counter strictly advanced relative to
    /// `prior`. Sorted ascending.
    #[must_use]
    pub fn advanced_since(&self, prior: &Self) -> SmallVec<[usize; 4]> {
        self.versions
            .iter()
            .enumerate()
            .filter(|&(idx, &version)| version > prior.get(idx))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether any counter moved backwards relative to `prior`.
    ///
    /// A correct change log never regresses; the tracker debug-asserts
    /// on this before publishing a new snapshot.
    #[must_use]
    pub fn regressed_since(&self, prior: &Self) -> bool {
        self.versions
            .iter()
            .enumerate()
            .any(|(idx, &version)| version < prior.get(idx))
    }
}

// ---------------------------------------------------------------------------
// VersionSource
// ---------------------------------------------------------------------------

/// Read side of the change log, as seen by the invalidation tracker.
///
/// A trait seam so the tracker can sit on top of a fallible,
/// storage-backed version reader as well as the in-memory [`ChangeLog`].
/// `read_versions` failing is the "transient read failure" path: the
/// tracker abandons the pass and retries on the next trigger.
pub trait VersionSource: Send + Sync {
    /// The fixed table universe, in table-index order.
    fn table_names(&self) -> &[String];

    /// Snapshot of all table counters. Per-counter reads are atomic;
    /// the snapshot as a whole is not required to be.
    fn read_versions(&self) -> Result<VersionSnapshot>;
}

// ---------------------------------------------------------------------------
// ChangeLog
// ---------------------------------------------------------------------------

/// Shared, concurrently-writable record of per-table write activity.
#[derive(Debug)]
pub struct ChangeLog {
    table_index: HashMap<String, usize>,
    table_names: Vec<String>,
    versions: Box<[AtomicU64]>,
}

impl ChangeLog {
    /// Build a change log over a fixed table universe.
    ///
    /// # Errors
    /// Returns [`TrackError::Internal`] on a duplicate table name.
    pub fn new<I, S>(tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table_index = HashMap::new();
        let mut table_names = Vec::new();
        for table in tables {
            let name: String = table.into();
            let idx = table_names.len();
            if table_index.insert(name.clone(), idx).is_some() {
                return Err(TrackError::Internal(format!(
                    "duplicate table in change log universe: {name:?}"
                )));
            }
            table_names.push(name);
        }
        let versions = (0..table_names.len())
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            table_index,
            table_names,
            versions,
        })
    }

    /// Resolve a table name to its index.
    ///
    /// # Errors
    /// Returns [`TrackError::UnknownTable`] for names outside the
    /// universe.
    pub fn resolve(&self, table: &str) -> Result<usize> {
        self.table_index
            .get(table)
            .copied()
            .ok_or_else(|| TrackError::UnknownTable(table.to_owned()))
    }

    /// Record one committed write against `table`, returning the new
    /// counter value. Atomic with respect to concurrent calls on the
    /// same or different tables.
    pub fn record_change(&self, table: &str) -> Result<u64> {
        let idx = self.resolve(table)?;
        let new_version = self.versions[idx].fetch_add(1, Ordering::AcqRel) + 1;
        trace!(table, version = new_version, "recorded change");
        Ok(new_version)
    }

    /// Current counter for one table, mainly for tests and diagnostics.
    pub fn version_of(&self, table: &str) -> Result<u64> {
        let idx = self.resolve(table)?;
        Ok(self.versions[idx].load(Ordering::Acquire))
    }
}

impl VersionSource for ChangeLog {
    fn table_names(&self) -> &[String] {
        &self.table_names
    }

    fn read_versions(&self) -> Result<VersionSnapshot> {
        let versions = self
            .versions
            .iter()
            .map(|counter| counter.load(Ordering::Acquire))
            .collect();
        Ok(VersionSnapshot::from_versions(versions))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn log_of(tables: &[&str]) -> ChangeLog {
        ChangeLog::new(tables.iter().copied()).unwrap()
    }

    // === Test 1: counters start at zero and advance by one per change ===
    #[test]
    fn test_record_change_increments() {
        let log = log_of(&["sample", "audit"]);
        assert_eq!(log.version_of("sample").unwrap(), 0);
        assert_eq!(log.record_change("sample").unwrap(), 1);
        assert_eq!(log.record_change("sample").unwrap(), 2);
        // Unrelated table untouched.
        assert_eq!(log.version_of("audit").unwrap(), 0);
    }

    // === Test 2: unknown table is rejected ===
    #[test]
    fn test_unknown_table_rejected() {
        let log = log_of(&["sample"]);
        let err = log.record_change("missing").unwrap_err();
        assert!(matches!(err, TrackError::UnknownTable(name) if name == "missing"));
    }

    // === Test 3: duplicate universe entry is rejected ===
    #[test]
    fn test_duplicate_table_rejected() {
        let result = ChangeLog::new(["sample", "sample"]);
        assert!(matches!(result, Err(TrackError::Internal(_))));
    }

    // === Test 4: snapshot delta reports exactly the advanced tables ===
    #[test]
    fn test_advanced_since() {
        let log = log_of(&["a", "b", "c"]);
        let before = log.read_versions().unwrap();
        log.record_change("a").unwrap();
        log.record_change("c").unwrap();
        let after = log.read_versions().unwrap();

        let delta = after.advanced_since(&before);
        assert_eq!(delta.as_slice(), &[0, 2]);
        assert!(!after.regressed_since(&before));
        // Reversed comparison is the regression case.
        assert!(before.regressed_since(&after));
    }

    // === Test 5: concurrent increments are not lost ===
    #[test]
    fn test_concurrent_record_change() {
        let log = Arc::new(log_of(&["sample"]));
        let threads = 8;
        let per_thread = 1000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        log.record_change("sample").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.version_of("sample").unwrap(), threads * per_thread);
    }

    // === Test 6: snapshot length tracks the declared universe ===
    #[test]
    fn test_snapshot_shape() {
        let log = log_of(&["a", "b"]);
        let snapshot = log.read_versions().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.get(7), 0, "out-of-range index reads as zero");
    }
}

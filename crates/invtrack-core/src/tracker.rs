//! The invalidation tracker: detect which tables changed since the
//! last pass, notify the observers that watch them.
//!
//! A sync pass is Idle → Syncing → Idle. Passes serialize on an
//! internal gate that also owns the sync snapshot, so the snapshot can
//! only advance, never regress, and two triggers can never interleave
//! their deliveries.
//!
//! Ordering contract of one pass:
//! 1. read change-log versions (abandon the pass on read failure,
//!    snapshot untouched — the next trigger sees the cumulative delta);
//! 2. delta = tables whose counter strictly advanced;
//! 3. empty delta: done, no observer work;
//! 4. snapshot the registry *after* the version read, then deliver to
//!    every snapshotted observer whose watched set intersects the
//!    delta, with no registry lock held;
//! 5. publish the versions read in step 1 as the new sync snapshot.
//!
//! Step 4's ordering is what makes registration race-free: a `register`
//! that returned before this pass's version read is guaranteed to be in
//! the registry snapshot, so an observer registered before a write
//! commits cannot miss that write's delivery.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use invtrack_error::{Result, TrackError};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use crate::change_log::{VersionSnapshot, VersionSource};
use crate::observer::{InvalidationObserver, ObserverKey};
use crate::registry::ObserverRegistry;

// ---------------------------------------------------------------------------
// SyncOutcome
// ---------------------------------------------------------------------------

/// Result of one completed sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No table advanced since the last pass; nobody was notified.
    Clean,
    /// At least one table advanced.
    Invalidated {
        /// The delta: every table whose counter advanced.
        tables: BTreeSet<String>,
        /// Observers whose callback completed without panicking.
        notified: usize,
    },
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

// ---------------------------------------------------------------------------
// InvalidationTracker
// ---------------------------------------------------------------------------

/// Serialized sync state: the gate doubles as owner of the snapshot.
struct SyncState {
    last: VersionSnapshot,
}

/// Orchestrates sync passes over a [`VersionSource`] and an observer
/// registry.
pub struct InvalidationTracker {
    source: Arc<dyn VersionSource>,
    registry: ObserverRegistry,
    state: Mutex<SyncState>,
}

impl std::fmt::Debug for InvalidationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationTracker")
            .field("tables", &self.source.table_names())
            .field("observers", &self.registry.len())
            .finish()
    }
}

impl InvalidationTracker {
    /// Create a tracker whose sync snapshot starts at all-zero, i.e.
    /// the first pass reports every table that has ever changed.
    #[must_use]
    pub fn new(source: Arc<dyn VersionSource>) -> Self {
        let table_count = source.table_names().len();
        Self {
            source,
            registry: ObserverRegistry::new(),
            state: Mutex::new(SyncState {
                last: VersionSnapshot::zeroed(table_count),
            }),
        }
    }

    /// Register `observer` for the given tables, replacing any previous
    /// registration of the same observer (latest table set wins).
    ///
    /// Once this returns, every sync pass whose change-log read happens
    /// afterwards will consider the observer for delivery.
    ///
    /// # Errors
    /// [`TrackError::EmptyTableSet`] for an empty `tables`,
    /// [`TrackError::UnknownTable`] for a name outside the change-log
    /// universe. Either way the registry is left unchanged.
    pub fn register(
        &self,
        observer: &Arc<dyn InvalidationObserver>,
        tables: &[&str],
    ) -> Result<()> {
        if tables.is_empty() {
            return Err(TrackError::EmptyTableSet);
        }
        let mut watched: SmallVec<[usize; 4]> = SmallVec::with_capacity(tables.len());
        for table in tables {
            watched.push(self.resolve(table)?);
        }
        watched.sort_unstable();
        watched.dedup();

        let replaced = self.registry.register(Arc::clone(observer), watched);
        debug!(
            key = ?ObserverKey::of(observer),
            tables = ?tables,
            replaced,
            "observer registered"
        );
        Ok(())
    }

    /// Remove `observer`. Returns `true` if it was registered.
    ///
    /// Passes started after this returns will not deliver to the
    /// observer; a pass whose change-log read began before this call
    /// may still deliver one final callback.
    pub fn unregister(&self, observer: &Arc<dyn InvalidationObserver>) -> bool {
        let key = ObserverKey::of(observer);
        let removed = self.registry.unregister(key);
        debug!(?key, removed, "observer unregistered");
        removed
    }

    /// Number of currently-registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    /// Versions as of the last successful pass, for diagnostics and
    /// monotonicity checks.
    #[must_use]
    pub fn last_synced_versions(&self) -> VersionSnapshot {
        self.state.lock().last.clone()
    }

    /// Run one sync pass. Invoked by the storage engine's commit hook
    /// after every committing write; safe (and cheap) to call when
    /// nothing changed.
    ///
    /// # Errors
    /// Propagates [`TrackError::VersionRead`] from the source; the
    /// sync snapshot is left untouched so the next trigger retries the
    /// cumulative delta.
    pub fn sync(&self) -> Result<SyncOutcome> {
        let mut state = self.state.lock();

        let current = match self.source.read_versions() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(%err, "sync pass abandoned: version read failed");
                return Err(err);
            }
        };
        debug_assert!(
            !current.regressed_since(&state.last),
            "change log counters regressed"
        );

        let advanced = current.advanced_since(&state.last);
        if advanced.is_empty() {
            trace!("sync pass clean");
            return Ok(SyncOutcome::Clean);
        }

        let table_names = self.source.table_names();
        let delta: BTreeSet<String> = advanced
            .iter()
            .map(|&idx| table_names[idx].clone())
            .collect();

        // Snapshot after the version read; deliver with no lock on the
        // registry so concurrent register/unregister never stalls.
        let observers = self.registry.snapshot();
        let mut notified = 0_usize;
        for entry in &observers {
            let hit: BTreeSet<String> = entry
                .watched
                .iter()
                .copied()
                .filter(|idx| advanced.binary_search(idx).is_ok())
                .map(|idx| table_names[idx].clone())
                .collect();
            if hit.is_empty() {
                continue;
            }
            let observer = Arc::clone(&entry.observer);
            if catch_unwind(AssertUnwindSafe(|| observer.on_invalidated(&hit))).is_err() {
                // One misbehaving observer must not starve the rest or
                // poison the snapshot.
                error!(
                    key = ?ObserverKey::of(&entry.observer),
                    tables = ?hit,
                    "observer callback panicked; continuing pass"
                );
            } else {
                notified += 1;
            }
        }

        state.last = current;
        debug!(tables = ?delta, notified, "sync pass delivered");
        Ok(SyncOutcome::Invalidated {
            tables: delta,
            notified,
        })
    }

    fn resolve(&self, table: &str) -> Result<usize> {
        self.source
            .table_names()
            .iter()
            .position(|name| name == table)
            .ok_or_else(|| TrackError::UnknownTable(table.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

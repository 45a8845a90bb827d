//! Concurrent mapping from observer identity to watched tables.
//!
//! All mutation goes through a single `parking_lot::Mutex` held only
//! for the map operation itself. Sync passes never iterate the live
//! map; they take a [`snapshot`](ObserverRegistry::snapshot) copy and
//! deliver callbacks with the lock released, so a slow or reentrant
//! observer cannot stall unrelated register/unregister calls.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::observer::{InvalidationObserver, ObserverKey};

/// One live registry entry: the observer handle plus its watched-table
/// indices (sorted, deduplicated).
#[derive(Clone)]
pub struct Registration {
    pub observer: Arc<dyn InvalidationObserver>,
    pub watched: SmallVec<[usize; 4]>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("key", &ObserverKey::of(&self.observer))
            .field("watched", &self.watched)
            .finish()
    }
}

/// The set of currently-registered observers.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    inner: Mutex<HashMap<ObserverKey, Registration>>,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer, or replace the watched set of an already
    /// registered one (idempotent re-registration). Returns `true` if
    /// an existing registration was replaced.
    pub fn register(
        &self,
        observer: Arc<dyn InvalidationObserver>,
        watched: SmallVec<[usize; 4]>,
    ) -> bool {
        let key = ObserverKey::of(&observer);
        let entry = Registration { observer, watched };
        self.inner.lock().insert(key, entry).is_some()
    }

    /// Remove an observer. Returns `true` if it was registered.
    ///
    /// Once this returns, no sync pass that snapshots the registry
    /// afterwards will see the observer. A pass that already took its
    /// snapshot may still deliver one final callback.
    pub fn unregister(&self, key: ObserverKey) -> bool {
        self.inner.lock().remove(&key).is_some()
    }

    /// Consistent point-in-time copy of the live set.
    ///
    /// The lock is held only for the clone; callers iterate and invoke
    /// callbacks entirely outside it.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Registration> {
        self.inner.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

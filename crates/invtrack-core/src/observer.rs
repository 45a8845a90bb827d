//! Observer capability interface and registration identity.

use std::collections::BTreeSet;
use std::sync::Arc;

/// A listener interested in changes to a specific set of tables.
///
/// Implementations receive at most one call per sync pass, carrying the
/// subset of their watched tables that actually changed. Callbacks run
/// with no registry lock held, so an implementation may freely register
/// or unregister observers (including itself); it must not trigger
/// another sync pass, which would deadlock on the pass-serializing
/// gate.
pub trait InvalidationObserver: Send + Sync {
    /// Invoked after a committing write invalidated `tables`.
    fn on_invalidated(&self, tables: &BTreeSet<String>);
}

/// Registry identity of an observer: the address of its `Arc`
/// allocation.
///
/// Reference identity means re-registering the same `Arc` replaces its
/// watched-table set, while two distinct allocations of an identical
/// observer type are independent registrations. The key is only valid
/// while the caller keeps the `Arc` alive, which registration itself
/// guarantees (the registry holds a clone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverKey(usize);

impl ObserverKey {
    #[must_use]
    pub fn of(observer: &Arc<dyn InvalidationObserver>) -> Self {
        Self(Arc::as_ptr(observer).cast::<()>() as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl InvalidationObserver for Noop {
        fn on_invalidated(&self, _tables: &BTreeSet<String>) {}
    }

    // === Test 1: identity follows the Arc allocation, not the type ===
    #[test]
    fn test_key_reference_identity() {
        let first: Arc<dyn InvalidationObserver> = Arc::new(Noop);
        let second: Arc<dyn InvalidationObserver> = Arc::new(Noop);
        let first_clone = Arc::clone(&first);

        assert_eq!(ObserverKey::of(&first), ObserverKey::of(&first_clone));
        assert_ne!(ObserverKey::of(&first), ObserverKey::of(&second));
    }
}

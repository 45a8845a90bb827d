//! Invalidation-tracking core: change log, observer registry, and the
//! detect-and-notify sync pass.
//!
//! The storage engine is deliberately out of scope here. Writers record
//! per-table changes in a [`ChangeLog`], and the engine's post-commit
//! hook (see [`CommitHook`]) triggers [`InvalidationTracker::sync`],
//! which computes the set of tables whose version advanced since the
//! last pass and notifies every registered observer watching one of
//! them.
//!
//! Concurrency contract in one line: registration is visible to every
//! sync pass whose change-log read happens after `register` returns,
//! and unregistration never suppresses delivery for a pass whose
//! change-log read began before `unregister` was called.

pub mod change_log;
pub mod hook;
pub mod observer;
pub mod registry;
pub mod tracker;

pub use change_log::{ChangeLog, VersionSnapshot, VersionSource};
pub use hook::CommitHook;
pub use invtrack_error::{Result, TrackError};
pub use observer::{InvalidationObserver, ObserverKey};
pub use registry::{ObserverRegistry, Registration};
pub use tracker::{InvalidationTracker, SyncOutcome};

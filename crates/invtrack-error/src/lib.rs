//! Error taxonomy shared by the invalidation-tracker crates.
//!
//! Split into its own leaf crate so every other crate (core, store,
//! harness) agrees on one `Result` alias without dependency cycles.

use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, TrackError>;

/// All failures the tracker stack can surface.
#[derive(Debug, Error)]
pub enum TrackError {
    /// An observer was registered with an empty watched-table set.
    ///
    /// Registration contract violation: callers must name at least one
    /// table. Rejected synchronously rather than silently no-opped so a
    /// useless observer cannot linger in the registry.
    #[error("observer registered with an empty table set")]
    EmptyTableSet,

    /// A table name outside the change log's declared universe.
    #[error("unknown table: {0:?}")]
    UnknownTable(String),

    /// Transient failure reading change-log versions during a sync pass.
    ///
    /// The pass is abandoned with the sync snapshot untouched; the next
    /// committing write retries and sees the cumulative delta.
    #[error("change log version read failed: {0}")]
    VersionRead(String),

    /// Storage-engine failure surfaced by the store layer.
    #[error("storage: {0}")]
    Storage(String),

    /// Invariant breakage that should never happen in correct code.
    #[error("internal: {0}")]
    Internal(String),
}

impl TrackError {
    /// Whether a sync pass hitting this error may be retried on the
    /// next trigger without losing notifications.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::VersionRead(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            TrackError::EmptyTableSet.to_string(),
            "observer registered with an empty table set"
        );
        assert_eq!(
            TrackError::UnknownTable("widgets".to_owned()).to_string(),
            "unknown table: \"widgets\""
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(TrackError::VersionRead("io".to_owned()).is_transient());
        assert!(!TrackError::EmptyTableSet.is_transient());
        assert!(!TrackError::Storage("locked".to_owned()).is_transient());
    }
}

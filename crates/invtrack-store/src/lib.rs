//! Thin SQLite store standing in for "the storage engine".
//!
//! The engine is a black box as far as invalidation tracking goes: it
//! accepts writes, executes deletes, and fires the tracker's
//! [`CommitHook`] synchronously after each committing write
//! transaction. Everything interesting happens on the other side of
//! that hook, in `invtrack-core`.
//!
//! One `(id TEXT PRIMARY KEY)` table is created per declared table
//! name. The connection sits behind a mutex, so writes are serialized
//! one at a time — the synchronous-inline hook model the stress
//! harness exercises.

use std::path::Path;
use std::sync::Arc;

use invtrack_core::{ChangeLog, CommitHook, InvalidationTracker, SyncOutcome, VersionSource};
use invtrack_error::{Result, TrackError};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, trace};

/// SQLite store plus the tracker wiring for its table universe.
pub struct Store {
    conn: Mutex<Connection>,
    change_log: Arc<ChangeLog>,
    tracker: Arc<InvalidationTracker>,
    hook: CommitHook,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("tables", &self.change_log.table_names())
            .finish()
    }
}

impl Store {
    /// Open an in-memory database with one table per name in `tables`.
    pub fn open_in_memory(tables: &[&str]) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn, tables)
    }

    /// Open (or create) an on-disk database with the same layout.
    pub fn open(path: &Path, tables: &[&str]) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init(conn, tables)
    }

    fn init(conn: Connection, tables: &[&str]) -> Result<Self> {
        let change_log = Arc::new(ChangeLog::new(tables.iter().copied())?);
        for table in tables {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (id TEXT PRIMARY KEY)"
            ))
            .map_err(storage_err)?;
        }
        let tracker = Arc::new(InvalidationTracker::new(
            Arc::clone(&change_log) as Arc<dyn VersionSource>
        ));
        let hook = CommitHook::new(Arc::clone(&change_log), Arc::clone(&tracker));
        debug!(?tables, "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            change_log,
            tracker,
            hook,
        })
    }

    /// The tracker observers register against.
    #[must_use]
    pub fn tracker(&self) -> &Arc<InvalidationTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn change_log(&self) -> &Arc<ChangeLog> {
        &self.change_log
    }

    /// Insert (or replace) a row, then fire the commit hook.
    pub fn insert(&self, table: &str, id: &str) -> Result<SyncOutcome> {
        self.write(table, "INSERT OR REPLACE INTO", "(id) VALUES (?1)", id)
    }

    /// Delete a row, then fire the commit hook. A delete that matched
    /// no row still triggers a sync pass but records no table change.
    pub fn delete(&self, table: &str, id: &str) -> Result<SyncOutcome> {
        self.write(table, "DELETE FROM", "WHERE id = ?1", id)
    }

    /// Row count, for test assertions.
    pub fn row_count(&self, table: &str) -> Result<u64> {
        self.change_log.resolve(table)?;
        let conn = self.conn.lock();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, u64>(0)
        })
        .map_err(storage_err)
    }

    fn write(&self, table: &str, verb: &str, tail: &str, id: &str) -> Result<SyncOutcome> {
        // Resolving first both validates the name against the declared
        // universe and keeps arbitrary strings out of the SQL text.
        self.change_log.resolve(table)?;
        let sql = format!("{verb} {table} {tail}");

        let affected = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(storage_err)?;
            let affected = tx.execute(&sql, [id]).map_err(storage_err)?;
            tx.commit().map_err(storage_err)?;
            affected
        };
        trace!(table, id, affected, "write committed");

        // Synchronous post-commit hook, on the committing thread. The
        // connection lock is already released; observer callbacks never
        // block other writers.
        if affected > 0 {
            self.hook.after_commit(&[table])
        } else {
            self.hook.after_commit(&[])
        }
    }
}

fn storage_err(err: rusqlite::Error) -> TrackError {
    TrackError::Storage(err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

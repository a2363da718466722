//! Connection handling for the `SQLite` entity store.
//!
//! Mutex acquisition with poison recovery, connection pragmas, and the mapping
//! from `rusqlite` failures onto the crate error taxonomy.

use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Mutex, MutexGuard};

/// Default `busy_timeout` in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (a previous critical section panicked), the inner
/// value is recovered and a warning is logged. `SQLite` rolls back any open
/// transaction on its own, so the connection stays usable.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for the entity store.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits for locks instead of failing with `SQLITE_BUSY`
/// - **`foreign_keys`**: required for edge cascades and kind protection
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign key enforcement cannot be
/// enabled. The other pragmas are best effort (in-memory databases, for
/// instance, report `memory` instead of `wal`).
pub fn configure_connection(conn: &Connection, busy_timeout_ms: u32) -> Result<()> {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", busy_timeout_ms);
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::operation_failed("enable_foreign_keys", e))?;
    Ok(())
}

/// Maps a `rusqlite` error onto the crate error taxonomy.
///
/// Constraint failures (unique, foreign key, not null) become
/// [`Error::IntegrityViolation`]; everything else is an
/// [`Error::OperationFailed`] tagged with `operation`.
#[allow(clippy::needless_pass_by_value)]
pub fn map_sqlite_error(operation: &str, e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            Error::IntegrityViolation(format!("{operation}: {detail}"))
        },
        other => Error::operation_failed(operation, other),
    }
}

// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread. Cloning a
//! [`Database`] clones the handle, not the connection.

use std::time::Duration;

use coffer_core::CofferError;
use rusqlite::ErrorCode;
use tracing::debug;

/// Busy timeout used when the caller does not supply one.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Handle to the vault's SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and run pending migrations.
    pub async fn open(path: &str) -> Result<Self, CofferError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Like [`Database::open`] with an explicit busy timeout.
    pub async fn open_with_timeout(path: &str, busy_timeout_ms: u64) -> Result<Self, CofferError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CofferError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CofferError::Storage {
                source: Box::new(e),
            })?;

        let migrated = conn
            .call(move |conn| -> Result<Result<(), refinery::Error>, rusqlite::Error> {
                apply_pragmas(conn, busy_timeout_ms)?;
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?;
        migrated.map_err(|e| CofferError::Storage {
            source: Box::new(e),
        })?;

        debug!(path, "vault database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn close(&self) -> Result<(), CofferError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Round-trip a trivial query through the connection thread.
    pub async fn health_check(&self) -> Result<(), CofferError> {
        self.conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        Ok(())
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, busy_timeout_ms: u64) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    // journal_mode reports the resulting mode as a row.
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
}

/// Convert a tokio-rusqlite error into a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CofferError {
    CofferError::Storage {
        source: Box::new(e),
    }
}

/// If `err` is a SQLite constraint failure, its message.
pub(crate) fn constraint_message(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            Some(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => None,
    }
}

/// Split a constraint failure out of a statement result.
///
/// The outer error aborts the connection call; the inner `Err` carries the
/// constraint message back to async code.
pub(crate) fn catch_constraint<T>(
    result: Result<T, rusqlite::Error>,
) -> Result<Result<T, String>, rusqlite::Error> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(e) => match constraint_message(&e) {
            Some(msg) => Ok(Err(msg)),
            None => Err(e),
        },
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

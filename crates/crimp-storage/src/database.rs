// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the `Database` handle is cheap to clone and every clone shares
//! that thread. Do NOT create additional `Connection` instances for writes.

use crimp_core::CrimpError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Handle to the shared SQLite database.
///
/// Opening runs all pending migrations and configures WAL mode. Query
/// modules accept `&Database` and go through [`Database::connection`].
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, configure
    /// PRAGMAs, and run migrations.
    pub async fn open(path: &str) -> Result<Self, CrimpError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| CrimpError::Storage { source: Box::new(e) })?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| CrimpError::Storage { source: Box::new(e) })?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close this handle.
    pub async fn close(self) -> Result<(), CrimpError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| CrimpError::Storage { source: Box::new(e) })
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> CrimpError {
    CrimpError::Storage { source: Box::new(e) }
}

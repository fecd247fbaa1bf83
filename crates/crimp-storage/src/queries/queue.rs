// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe message processing.
//!
//! Messages move pending -> processing -> completed. A consumer that dies
//! before acknowledging leaves its message locked; once the lock expires the
//! message is dequeued again, giving at-least-once delivery. Explicit
//! rejection increments the attempt counter and parks the message as
//! `failed` when the attempt budget is exhausted.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;
use crate::models::QueueEntry;

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        locked_until: row.get(8)?,
    })
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, CrimpError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next available entry from the named queue.
///
/// Atomically selects the oldest pending entry -- or a processing entry
/// whose lock has expired (crashed consumer) -- and marks it as
/// "processing" with a 5-minute lock. Returns `None` if nothing is
/// available.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, CrimpError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, payload, status, attempts, max_attempts,
                            created_at, updated_at, locked_until
                     FROM queue
                     WHERE queue_name = ?1
                       AND (status = 'pending'
                            OR (status = 'processing'
                                AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                     ORDER BY id ASC
                     LIMIT 1",
                )?;
                let mut rows = stmt.query_map(params![queue_name], entry_from_row)?;
                rows.next().transpose()?
            };

            match result {
                Some(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![entry.id],
                    )?;
                    tx.commit()?;

                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        ..entry
                    }))
                }
                None => {
                    tx.commit()?;
                    Ok(None)
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing of a queue entry.
///
/// Marks the entry as "completed".
pub async fn ack(db: &Database, id: i64) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a queue entry as failed.
///
/// Increments attempts. If attempts >= max_attempts, sets status to "failed".
/// Otherwise resets to "pending" for redelivery and clears the lock.
pub async fn fail(db: &Database, id: i64) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                conn.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?1,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
            } else {
                conn.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?1,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of entries still waiting in the named queue.
pub async fn depth(db: &Database, queue_name: &str) -> Result<i64, CrimpError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = 'pending'",
                params![queue_name],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "tasks", r#"{"msg":"hello"}"#, 3).await.unwrap();
        assert!(id > 0);

        let entry = dequeue(&db, "tasks").await.unwrap();
        assert!(entry.is_some());
        let entry = entry.unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.queue_name, "tasks");
        assert_eq!(entry.payload, r#"{"msg":"hello"}"#);

        // Queue should be empty now (no more pending).
        let next = dequeue(&db, "tasks").await.unwrap();
        assert!(next.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_marks_completed() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue(&db, "test").await.unwrap().unwrap();

        ack(&db, id).await.unwrap();

        let status: String = db
            .connection()
            .call(move |conn| {
                let s = conn.query_row(
                    "SELECT status FROM queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                Ok::<String, rusqlite::Error>(s)
            })
            .await
            .unwrap();
        assert_eq!(status, "completed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_increments_attempts_and_retries() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue(&db, "test").await.unwrap().unwrap();

        // First fail: attempts=1, back to pending.
        fail(&db, id).await.unwrap();

        let (status, attempts): (String, i32) = db
            .connection()
            .call(move |conn| {
                let pair = conn.query_row(
                    "SELECT status, attempts FROM queue WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok::<(String, i32), rusqlite::Error>(pair)
            })
            .await
            .unwrap();
        assert_eq!(status, "pending");
        assert_eq!(attempts, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_marks_permanently_failed_at_max_attempts() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();

        for _ in 0..3 {
            let _entry = dequeue(&db, "test").await.unwrap().unwrap();
            fail(&db, id).await.unwrap();
        }

        let status: String = db
            .connection()
            .call(move |conn| {
                let s = conn.query_row(
                    "SELECT status FROM queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                Ok(s)
            })
            .await
            .unwrap();
        assert_eq!(status, "failed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_empty_queue_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = dequeue(&db, "nonexistent").await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_is_redelivered() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue(&db, "test").await.unwrap().unwrap();

        // In-flight message is invisible.
        assert!(dequeue(&db, "test").await.unwrap().is_none());

        // Simulate a crashed consumer by expiring the lock.
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE queue SET locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-1 minutes')
                     WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let redelivered = dequeue(&db, "test").await.unwrap();
        assert!(redelivered.is_some());
        assert_eq!(redelivered.unwrap().id, id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let (db, _dir) = setup_db().await;

        enqueue(&db, "tasks", "a", 3).await.unwrap();
        enqueue(&db, "results", "b", 3).await.unwrap();

        assert_eq!(depth(&db, "tasks").await.unwrap(), 1);
        assert_eq!(depth(&db, "results").await.unwrap(), 1);

        let entry = dequeue(&db, "results").await.unwrap().unwrap();
        assert_eq!(entry.payload, "b");
        assert_eq!(depth(&db, "results").await.unwrap(), 0);
        assert_eq!(depth(&db, "tasks").await.unwrap(), 1);

        db.close().await.unwrap();
    }
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification audit rows. Write-once: recorded before the delivery
//! attempt so the audit trail survives transport failures.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Notification;

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Record a notification for a user.
pub async fn add(db: &Database, user_id: i64, text: String) -> Result<Notification, CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, text) VALUES (?1, ?2)",
                params![user_id, text],
            )?;
            let id = conn.last_insert_rowid();
            let notification = conn.query_row(
                "SELECT id, user_id, text, created_at FROM notifications WHERE id = ?1",
                params![id],
                notification_from_row,
            )?;
            Ok(notification)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// How many notifications a user has received.
pub async fn count_for_user(db: &Database, user_id: i64) -> Result<i64, CrimpError> {
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent notifications for a user.
pub async fn list_recent(
    db: &Database,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, text, created_at FROM notifications
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit], notification_from_row)?;
            let mut notifications = Vec::new();
            for row in rows {
                notifications.push(row?);
            }
            Ok(notifications)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

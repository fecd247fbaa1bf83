// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task correlation rows. Created before the job message is published and
//! never deleted: an orphaned Task is diagnosable, a message without a Task
//! is not.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Task, User};
use crate::queries::users;

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Persist a new correlation row.
pub async fn create(db: &Database, uuid: String, user_id: i64) -> Result<Task, CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (uuid, user_id) VALUES (?1, ?2)",
                params![uuid, user_id],
            )?;
            let id = conn.last_insert_rowid();
            let task = conn.query_row(
                "SELECT id, uuid, user_id, created_at FROM tasks WHERE id = ?1",
                params![id],
                task_from_row,
            )?;
            Ok(task)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a task by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<Task>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, uuid, user_id, created_at FROM tasks WHERE id = ?1")?;
            let mut rows = stmt.query_map(params![id], task_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve the user who requested the task.
pub async fn requester(db: &Database, task_id: i64) -> Result<Option<User>, CrimpError> {
    match get(db, task_id).await? {
        Some(task) => users::get(db, task.user_id).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_and_resolve_requester() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let user = users::ensure_user(&db, 55, Some("Req".into()), None, None)
            .await
            .unwrap();

        let task = create(&db, "uuid-1".into(), user.id).await.unwrap();
        assert_eq!(task.uuid, "uuid-1");

        let found = requester(&db, task.id).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(requester(&db, 404).await.unwrap().is_none());
        db.close().await.unwrap();
    }
}

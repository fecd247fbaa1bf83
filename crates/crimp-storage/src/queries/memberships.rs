// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership CRUD operations. Unique per (abonement, user); the owner
//! never holds a membership row for their own abonement.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Membership;

fn membership_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        abonement_id: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Link a user to an abonement. Fails on the unique constraint if the
/// membership already exists; callers check with [`find`] first.
pub async fn add(db: &Database, abonement_id: i64, user_id: i64) -> Result<Membership, CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO memberships (abonement_id, user_id) VALUES (?1, ?2)",
                params![abonement_id, user_id],
            )?;
            let id = conn.last_insert_rowid();
            let membership = conn.query_row(
                "SELECT id, abonement_id, user_id, created_at FROM memberships WHERE id = ?1",
                params![id],
                membership_from_row,
            )?;
            Ok(membership)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a user's membership in an abonement.
pub async fn find(
    db: &Database,
    abonement_id: i64,
    user_id: i64,
) -> Result<Option<Membership>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, abonement_id, user_id, created_at FROM memberships
                 WHERE abonement_id = ?1 AND user_id = ?2",
            )?;
            let mut rows = stmt.query_map(params![abonement_id, user_id], membership_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove a user's membership ("unlink"). Returns whether a row was removed.
pub async fn remove(db: &Database, abonement_id: i64, user_id: i64) -> Result<bool, CrimpError> {
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM memberships WHERE abonement_id = ?1 AND user_id = ?2",
                params![abonement_id, user_id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Internal ids of all current members of an abonement.
pub async fn member_user_ids(db: &Database, abonement_id: i64) -> Result<Vec<i64>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM memberships WHERE abonement_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![abonement_id], |row| row.get(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{abonements, users};
    use tempfile::tempdir;

    #[tokio::test]
    async fn membership_is_unique_per_pair() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let owner = users::ensure_user(&db, 1, None, None, None).await.unwrap();
        let member = users::ensure_user(&db, 2, None, None, None).await.unwrap();
        let a = abonements::create(&db, owner.id, "Pass".into(), 0, None, None)
            .await
            .unwrap();

        add(&db, a.id, member.id).await.unwrap();
        assert!(find(&db, a.id, member.id).await.unwrap().is_some());
        // Second insert trips the unique constraint.
        assert!(add(&db, a.id, member.id).await.is_err());

        assert_eq!(member_user_ids(&db, a.id).await.unwrap(), vec![member.id]);

        assert!(remove(&db, a.id, member.id).await.unwrap());
        assert!(!remove(&db, a.id, member.id).await.unwrap());

        db.close().await.unwrap();
    }
}

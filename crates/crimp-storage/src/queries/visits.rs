// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visit CRUD operations.
//!
//! Mutations run as single transactions so the read-then-write capacity and
//! permission checks are atomic with respect to other calls through the same
//! database handle. Across independent processes the capacity check remains
//! a soft limit.

use chrono::{DateTime, Utc};
use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{decode_ts, encode_ts, Visit};

fn visit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Visit> {
    let raw: String = row.get(3)?;
    let ts = decode_ts(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Visit {
        id: row.get(0)?,
        abonement_id: row.get(1)?,
        user_id: row.get(2)?,
        ts,
    })
}

/// Record a visit if the abonement exists, is not hidden, and has capacity
/// left. Returns `None` otherwise: a full or vanished pass is an ordinary
/// outcome here, not an error.
pub async fn record_checked(
    db: &Database,
    abonement_id: i64,
    user_id: i64,
    ts: DateTime<Utc>,
) -> Result<Option<Visit>, CrimpError> {
    let encoded = encode_ts(&ts);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let target: Option<(i64, bool)> = {
                let mut stmt =
                    tx.prepare("SELECT total_visits, hidden FROM abonements WHERE id = ?1")?;
                let mut rows =
                    stmt.query_map(params![abonement_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.next().transpose()?
            };

            let total_visits = match target {
                None | Some((_, true)) => {
                    tx.commit()?;
                    return Ok(None);
                }
                Some((total, false)) => total,
            };

            if total_visits > 0 {
                let used: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM visits WHERE abonement_id = ?1",
                    params![abonement_id],
                    |row| row.get(0),
                )?;
                if used >= total_visits {
                    tx.commit()?;
                    return Ok(None);
                }
            }

            tx.execute(
                "INSERT INTO visits (abonement_id, user_id, ts) VALUES (?1, ?2, ?3)",
                params![abonement_id, user_id, encoded],
            )?;
            let id = tx.last_insert_rowid();
            let visit = tx.query_row(
                "SELECT id, abonement_id, user_id, ts FROM visits WHERE id = ?1",
                params![id],
                visit_from_row,
            )?;
            tx.commit()?;
            Ok(Some(visit))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a visit by id.
pub async fn get(db: &Database, visit_id: i64) -> Result<Option<Visit>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, abonement_id, user_id, ts FROM visits WHERE id = ?1")?;
            let mut rows = stmt.query_map(params![visit_id], visit_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total recorded visits for an abonement.
pub async fn count(db: &Database, abonement_id: i64) -> Result<i64, CrimpError> {
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM visits WHERE abonement_id = ?1",
                params![abonement_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Visits recorded by one user against an abonement.
pub async fn count_by_user(
    db: &Database,
    abonement_id: i64,
    user_id: i64,
) -> Result<i64, CrimpError> {
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM visits WHERE abonement_id = ?1 AND user_id = ?2",
                params![abonement_id, user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// One page of visits, newest first, with the visitor's display name.
pub async fn list_page(
    db: &Database,
    abonement_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<(Visit, String)>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.abonement_id, v.user_id, v.ts,
                        COALESCE(u.display_name, u.username, u.first_name, CAST(u.chat_id AS TEXT))
                 FROM visits v
                 JOIN users u ON u.id = v.user_id
                 WHERE v.abonement_id = ?1
                 ORDER BY v.ts DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![abonement_id, limit, offset], |row| {
                Ok((visit_from_row(row)?, row.get::<_, String>(4)?))
            })?;
            let mut visits = Vec::new();
            for row in rows {
                visits.push(row?);
            }
            Ok(visits)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every visit of an abonement, oldest first, with the visitor's display
/// name. Used for the full external-sheet resync.
pub async fn list_all(db: &Database, abonement_id: i64) -> Result<Vec<(Visit, String)>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.abonement_id, v.user_id, v.ts,
                        COALESCE(u.display_name, u.username, u.first_name, CAST(u.chat_id AS TEXT))
                 FROM visits v
                 JOIN users u ON u.id = v.user_id
                 WHERE v.abonement_id = ?1
                 ORDER BY v.ts ASC",
            )?;
            let rows = stmt.query_map(params![abonement_id], |row| {
                Ok((visit_from_row(row)?, row.get::<_, String>(4)?))
            })?;
            let mut visits = Vec::new();
            for row in rows {
                visits.push(row?);
            }
            Ok(visits)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite a visit's timestamp if the actor is the visit's user or the
/// abonement's owner and the abonement is not hidden. Returns whether the
/// update happened.
pub async fn update_checked(
    db: &Database,
    visit_id: i64,
    actor_id: i64,
    new_ts: DateTime<Utc>,
) -> Result<bool, CrimpError> {
    let encoded = encode_ts(&new_ts);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if !visit_permitted(&tx, visit_id, actor_id)? {
                tx.commit()?;
                return Ok(false);
            }
            tx.execute(
                "UPDATE visits SET ts = ?1 WHERE id = ?2",
                params![encoded, visit_id],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a visit under the same permission rule as [`update_checked`].
pub async fn delete_checked(
    db: &Database,
    visit_id: i64,
    actor_id: i64,
) -> Result<bool, CrimpError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if !visit_permitted(&tx, visit_id, actor_id)? {
                tx.commit()?;
                return Ok(false);
            }
            tx.execute("DELETE FROM visits WHERE id = ?1", params![visit_id])?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn visit_permitted(
    tx: &rusqlite::Transaction<'_>,
    visit_id: i64,
    actor_id: i64,
) -> rusqlite::Result<bool> {
    let found: Option<(i64, i64, bool)> = {
        let mut stmt = tx.prepare(
            "SELECT v.user_id, a.owner_id, a.hidden
             FROM visits v JOIN abonements a ON a.id = v.abonement_id
             WHERE v.id = ?1",
        )?;
        let mut rows = stmt.query_map(params![visit_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        rows.next().transpose()?
    };
    Ok(match found {
        Some((user_id, owner_id, hidden)) => {
            !hidden && (actor_id == user_id || actor_id == owner_id)
        }
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{abonements, users};
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        _dir: tempfile::TempDir,
        owner_id: i64,
        member_id: i64,
        abonement_id: i64,
    }

    async fn setup(total_visits: i64) -> Fixture {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let owner = users::ensure_user(&db, 1, Some("Owner".into()), None, None)
            .await
            .unwrap();
        let member = users::ensure_user(&db, 2, Some("Member".into()), None, None)
            .await
            .unwrap();
        let a = abonements::create(&db, owner.id, "Pass".into(), total_visits, None, None)
            .await
            .unwrap();
        Fixture {
            db,
            _dir: dir,
            owner_id: owner.id,
            member_id: member.id,
            abonement_id: a.id,
        }
    }

    #[tokio::test]
    async fn capacity_is_never_exceeded_single_threaded() {
        let f = setup(3).await;
        let mut recorded = 0;
        for _ in 0..5 {
            if record_checked(&f.db, f.abonement_id, f.member_id, Utc::now())
                .await
                .unwrap()
                .is_some()
            {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 3);
        assert_eq!(count(&f.db, f.abonement_id).await.unwrap(), 3);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unlimited_abonement_accepts_any_number() {
        let f = setup(0).await;
        for _ in 0..20 {
            assert!(record_checked(&f.db, f.abonement_id, f.owner_id, Utc::now())
                .await
                .unwrap()
                .is_some());
        }
        assert_eq!(count(&f.db, f.abonement_id).await.unwrap(), 20);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn hidden_abonement_rejects_visits_silently() {
        let f = setup(10).await;
        abonements::set_hidden(&f.db, f.abonement_id).await.unwrap();

        let result = record_checked(&f.db, f.abonement_id, f.member_id, Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(count(&f.db, f.abonement_id).await.unwrap(), 0);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_abonement_rejects_visits_silently() {
        let f = setup(10).await;
        let result = record_checked(&f.db, 9999, f.member_id, Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_page_is_newest_first() {
        let f = setup(0).await;
        let base = Utc::now();
        for i in 0..5 {
            record_checked(
                &f.db,
                f.abonement_id,
                f.member_id,
                base + chrono::Duration::minutes(i),
            )
            .await
            .unwrap();
        }

        let page = list_page(&f.db, f.abonement_id, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].0.ts > page[1].0.ts);
        assert_eq!(page[0].1, "Member");

        let next = list_page(&f.db, f.abonement_id, 2, 2).await.unwrap();
        assert!(next[0].0.ts < page[1].0.ts);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_edit_requires_owner_or_visitor() {
        let f = setup(0).await;
        let stranger = users::ensure_user(&f.db, 3, Some("Stranger".into()), None, None)
            .await
            .unwrap();
        let visit = record_checked(&f.db, f.abonement_id, f.member_id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let new_ts = Utc::now() + chrono::Duration::hours(1);
        assert!(!update_checked(&f.db, visit.id, stranger.id, new_ts)
            .await
            .unwrap());
        assert!(update_checked(&f.db, visit.id, f.member_id, new_ts)
            .await
            .unwrap());
        assert!(update_checked(&f.db, visit.id, f.owner_id, new_ts)
            .await
            .unwrap());

        assert!(!delete_checked(&f.db, visit.id, stranger.id).await.unwrap());
        assert!(delete_checked(&f.db, visit.id, f.owner_id).await.unwrap());
        assert!(get(&f.db, visit.id).await.unwrap().is_none());
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_edit_refused_on_hidden_abonement() {
        let f = setup(0).await;
        let visit = record_checked(&f.db, f.abonement_id, f.member_id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        abonements::set_hidden(&f.db, f.abonement_id).await.unwrap();

        assert!(!update_checked(&f.db, visit.id, f.owner_id, Utc::now())
            .await
            .unwrap());
        assert!(!delete_checked(&f.db, visit.id, f.member_id).await.unwrap());
        f.db.close().await.unwrap();
    }
}

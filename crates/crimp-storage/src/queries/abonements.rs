// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abonement CRUD operations.
//!
//! The token is generated once at creation and never changes; soft deletion
//! only flips the `hidden` flag so history stays readable.

use chrono::NaiveDate;
use crimp_core::CrimpError;
use rusqlite::params;
use tracing::info;

use crate::database::Database;
use crate::models::Abonement;

const ABONEMENT_COLUMNS: &str = "id, token, owner_id, name, total_visits, expiry_date, description, hidden, sheet_id, created_at, updated_at";

const DATE_FMT: &str = "%Y-%m-%d";

pub(crate) fn abonement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Abonement> {
    let expiry_raw: Option<String> = row.get(5)?;
    let expiry_date = match expiry_raw {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(Abonement {
        id: row.get(0)?,
        token: row.get(1)?,
        owner_id: row.get(2)?,
        name: row.get(3)?,
        total_visits: row.get(4)?,
        expiry_date,
        description: row.get(6)?,
        hidden: row.get(7)?,
        sheet_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn encode_expiry(expiry: Option<NaiveDate>) -> Option<String> {
    expiry.map(|d| d.format(DATE_FMT).to_string())
}

/// Create a new abonement with a fresh token.
pub async fn create(
    db: &Database,
    owner_id: i64,
    name: String,
    total_visits: i64,
    expiry_date: Option<NaiveDate>,
    description: Option<String>,
) -> Result<Abonement, CrimpError> {
    let token = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO abonements (token, owner_id, name, total_visits, expiry_date, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    token,
                    owner_id,
                    name,
                    total_visits,
                    encode_expiry(expiry_date),
                    description
                ],
            )?;
            let id = conn.last_insert_rowid();
            info!(abonement_id = id, owner_id, "created abonement");
            let abonement = conn.query_row(
                &format!("SELECT {ABONEMENT_COLUMNS} FROM abonements WHERE id = ?1"),
                params![id],
                abonement_from_row,
            )?;
            Ok(abonement)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an abonement by internal id, hidden or not.
pub async fn get(db: &Database, id: i64) -> Result<Option<Abonement>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ABONEMENT_COLUMNS} FROM abonements WHERE id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![id], abonement_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an abonement by its external token.
pub async fn get_by_token(db: &Database, token: String) -> Result<Option<Abonement>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ABONEMENT_COLUMNS} FROM abonements WHERE token = ?1"
            ))?;
            let mut rows = stmt.query_map(params![token], abonement_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite the editable fields. The token and owner are never touched.
pub async fn update(
    db: &Database,
    id: i64,
    name: String,
    total_visits: i64,
    expiry_date: Option<NaiveDate>,
    description: Option<String>,
) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE abonements SET name = ?1, total_visits = ?2, expiry_date = ?3,
                 description = ?4, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?5",
                params![name, total_visits, encode_expiry(expiry_date), description, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Soft-delete: hide the abonement, preserving all history.
pub async fn set_hidden(db: &Database, id: i64) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE abonements SET hidden = 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the lazily created external sheet id.
pub async fn set_sheet_id(db: &Database, id: i64, sheet_id: String) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE abonements SET sheet_id = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![sheet_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Non-hidden abonements owned by the user, newest first.
pub async fn list_by_owner(db: &Database, owner_id: i64) -> Result<Vec<Abonement>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ABONEMENT_COLUMNS} FROM abonements
                 WHERE owner_id = ?1 AND hidden = 0 ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map(params![owner_id], abonement_from_row)?;
            let mut abonements = Vec::new();
            for row in rows {
                abonements.push(row?);
            }
            Ok(abonements)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Non-hidden abonements the user has joined as a member, newest first.
pub async fn list_joined(db: &Database, user_id: i64) -> Result<Vec<Abonement>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.token, a.owner_id, a.name, a.total_visits, a.expiry_date,
                        a.description, a.hidden, a.sheet_id, a.created_at, a.updated_at
                 FROM abonements a
                 JOIN memberships m ON m.abonement_id = a.id
                 WHERE m.user_id = ?1 AND a.hidden = 0
                 ORDER BY a.id DESC",
            )?;
            let rows = stmt.query_map(params![user_id], abonement_from_row)?;
            let mut abonements = Vec::new();
            for row in rows {
                abonements.push(row?);
            }
            Ok(abonements)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

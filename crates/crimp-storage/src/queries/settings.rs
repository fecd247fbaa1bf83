// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user key/value settings, including the per-abonement notification
//! opt-in keys.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;

/// Key of the per-abonement notification opt-in setting. Value "all" means
/// opted in; anything else (including absence) means opted out.
pub fn notify_key(abonement_id: i64) -> String {
    format!("notify_abonement_{abonement_id}")
}

/// Value that opts a user in to visit notifications.
pub const NOTIFY_ALL: &str = "all";

/// Get a setting value.
pub async fn get(db: &Database, user_id: i64, key: String) -> Result<Option<String>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT value FROM settings WHERE user_id = ?1 AND key = ?2")?;
            let mut rows = stmt.query_map(params![user_id, key], |row| row.get(0))?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert a setting value.
pub async fn set(
    db: &Database,
    user_id: i64,
    key: String,
    value: String,
) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO settings (user_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value",
                params![user_id, key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove a setting. Missing keys are a no-op.
pub async fn unset(db: &Database, user_id: i64, key: String) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

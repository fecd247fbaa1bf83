// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations.

use crimp_core::types::{Role, RoleSet};
use crimp_core::CrimpError;
use rusqlite::params;
use tracing::info;

use crate::database::Database;
use crate::models::User;

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let roles: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        username: row.get(4)?,
        phone: row.get(5)?,
        display_name: row.get(6)?,
        roles: RoleSet::parse(&roles),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const USER_COLUMNS: &str = "id, chat_id, first_name, last_name, username, phone, display_name, roles, created_at, updated_at";

/// Look up a user by chat id, creating an unregistered row on first contact.
pub async fn ensure_user(
    db: &Database,
    chat_id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
) -> Result<User, CrimpError> {
    db.connection()
        .call(move |conn| {
            let existing = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"
                ))?;
                let mut rows = stmt.query_map(params![chat_id], user_from_row)?;
                rows.next().transpose()?
            };
            if let Some(user) = existing {
                return Ok(user);
            }
            conn.execute(
                "INSERT INTO users (chat_id, first_name, last_name, username, roles)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chat_id,
                    first_name,
                    last_name,
                    username,
                    RoleSet::single(Role::Unregistered).encode()
                ],
            )?;
            let id = conn.last_insert_rowid();
            info!(chat_id, user_id = id, "created user");
            let user = conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )?;
            Ok(user)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a user by internal id.
pub async fn get(db: &Database, id: i64) -> Result<Option<User>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let mut rows = stmt.query_map(params![id], user_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a user by external chat id.
pub async fn get_by_chat_id(db: &Database, chat_id: i64) -> Result<Option<User>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![chat_id], user_from_row)?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Complete registration: store phone and display name, flip the role.
pub async fn register(
    db: &Database,
    id: i64,
    phone: String,
    display_name: String,
) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            let raw: String =
                conn.query_row("SELECT roles FROM users WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })?;
            let mut roles = RoleSet::parse(&raw);
            roles.remove(Role::Unregistered);
            roles.insert(Role::Registered);
            conn.execute(
                "UPDATE users SET phone = ?1, display_name = ?2, roles = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![phone, display_name, roles.encode(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace a user's role set.
pub async fn set_roles(db: &Database, id: i64, roles: RoleSet) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET roles = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![roles.encode(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

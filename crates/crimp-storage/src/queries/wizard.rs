// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted per-chat wizard state: current step name plus the accumulated
//! answers as a JSON payload. Keyed by chat id so a restart of the bot
//! process resumes every conversation where it left off.

use crimp_core::CrimpError;
use rusqlite::params;

use crate::database::Database;

/// Load the persisted (step, data) pair for a chat.
pub async fn load(db: &Database, chat_id: i64) -> Result<Option<(String, String)>, CrimpError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT state, data FROM wizard_states WHERE chat_id = ?1")?;
            let mut rows =
                stmt.query_map(params![chat_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            Ok(rows.next().transpose()?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert the state for a chat.
pub async fn save(
    db: &Database,
    chat_id: i64,
    state: String,
    data: String,
) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO wizard_states (chat_id, state, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT (chat_id) DO UPDATE SET state = excluded.state,
                 data = excluded.data,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![chat_id, state, data],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Drop the state for a chat, returning it to idle.
pub async fn clear(db: &Database, chat_id: i64) -> Result<(), CrimpError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM wizard_states WHERE chat_id = ?1", params![chat_id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

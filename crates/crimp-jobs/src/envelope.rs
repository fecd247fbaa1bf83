// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed message envelopes exchanged over the queues.
//!
//! Wire format is JSON with a `job_type` tag. Every message carries an
//! opaque correlation `uuid`; task-style messages additionally carry the
//! `task_id` of their correlation row.

use serde::{Deserialize, Serialize};

use crimp_core::CrimpError;

/// Outcome tag carried by results of completed task-style jobs.
pub const RESULT_DONE: &str = "done";

/// Which visit mutation a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitEvent {
    VisitNew,
    VisitEdit,
    VisitDelete,
}

/// One visit mutation, as carried through the pipeline.
///
/// Timestamps travel pre-formatted in the user-facing format: the notifier
/// and the sheet both render them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitChange {
    pub uuid: String,
    pub msg_type: VisitEvent,
    pub abonement_id: i64,
    pub visit_id: i64,
    /// Internal id of the acting user, excluded from the fan-out.
    pub actor_id: i64,
    /// Visit timestamp; for edits, the old value.
    pub ts: String,
    /// New timestamp, present for edits only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_new: Option<String>,
}

/// A job message on the tasks queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum Job {
    /// Regenerate one named site table (or "all").
    TableGenerator {
        uuid: String,
        task_id: i64,
        job: String,
    },
    /// Render a picture set.
    PicturesGenerator {
        uuid: String,
        task_id: i64,
        job: String,
    },
    /// Full resync of one abonement's external sheet.
    AbonementUpdate { uuid: String, abonement_id: i64 },
    /// Upsert one visit row in the external sheet, then fan out.
    AbonementVisit(VisitChange),
}

/// A result message on the results queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobResult {
    /// One table finished regenerating.
    TableGenerator {
        uuid: String,
        task_id: i64,
        job: String,
        table: String,
        result: String,
    },
    /// A picture set finished rendering.
    PicturesGenerator {
        uuid: String,
        task_id: i64,
        job: String,
        result: String,
    },
    /// A visit mutation is synced and ready for notification fan-out.
    AbonementVisit(VisitChange),
}

/// Serialize an envelope for the wire.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CrimpError> {
    serde_json::to_string(value).map_err(|e| CrimpError::Internal(format!("encode envelope: {e}")))
}

/// Decode a wire payload.
///
/// Failures map to [`CrimpError::Decode`]: consumers acknowledge such
/// messages immediately, since redelivery can never succeed.
pub fn decode<'a, T: Deserialize<'a>>(payload: &'a str) -> Result<T, CrimpError> {
    serde_json::from_str(payload).map_err(|e| CrimpError::Decode(e.to_string()))
}

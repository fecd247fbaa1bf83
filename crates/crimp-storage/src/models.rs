// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities, one struct per table.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use crimp_core::types::RoleSet;

/// Encode a timestamp for storage. Fixed microsecond precision keeps the
/// text representation order-compatible with time order.
pub fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp.
pub fn decode_ts(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// A chat user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// External chat id assigned by the transport.
    pub chat_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    /// Name shown to other users, filled during registration.
    pub display_name: Option<String>,
    pub roles: RoleSet,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Best available human-readable name.
    pub fn display(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.chat_id.to_string())
    }
}

/// Correlation row for an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    /// The user who requested the job.
    pub user_id: i64,
    pub created_at: String,
}

/// A shared visit pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abonement {
    pub id: i64,
    /// Immutable external identifier used in deep links and callbacks.
    pub token: String,
    pub owner_id: i64,
    pub name: String,
    /// 0 means unlimited capacity.
    pub total_visits: i64,
    pub expiry_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub hidden: bool,
    /// External sheet id, assigned lazily on first sync.
    pub sheet_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Abonement {
    /// Whether the pass tracks a visit budget.
    pub fn unlimited(&self) -> bool {
        self.total_visits == 0
    }
}

/// A non-owner user's link to an abonement they joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub id: i64,
    pub abonement_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

/// One recorded use of an abonement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: i64,
    pub abonement_id: i64,
    pub user_id: i64,
    pub ts: DateTime<Utc>,
}

/// Write-once audit record of a delivered (or attempted) notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: String,
}

/// Generic per-user key/value setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub value: String,
}

/// One entry in the shared message queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ts_round_trips() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let encoded = encode_ts(&ts);
        assert_eq!(decode_ts(&encoded).unwrap(), ts);
    }

    #[test]
    fn ts_text_order_matches_time_order() {
        let early = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let late = early + chrono::Duration::milliseconds(5);
        assert!(encode_ts(&early) < encode_ts(&late));
    }

    #[test]
    fn user_display_falls_back() {
        let mut user = User {
            id: 1,
            chat_id: 777,
            first_name: Some("Ann".to_string()),
            last_name: None,
            username: Some("ann_climbs".to_string()),
            phone: None,
            display_name: None,
            roles: RoleSet::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(user.display(), "ann_climbs");
        user.display_name = Some("Ann K.".to_string());
        assert_eq!(user.display(), "Ann K.");
        user.display_name = None;
        user.username = None;
        assert_eq!(user.display(), "Ann");
        user.first_name = None;
        assert_eq!(user.display(), "777");
    }
}

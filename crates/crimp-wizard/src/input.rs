// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input parsing: slash commands, free text, and the structured action
//! codes carried in keyboard callback payloads.

use chrono::{NaiveDate, NaiveDateTime};
use crimp_core::types::{DATE_FMT, DATE_TIME_FMT};

/// Universal slash commands, valid in any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Abort the current flow and return to idle.
    Cancel,
    /// Keep the current value (edit flows only).
    Skip,
    /// Explicit "no value": no expiry, unlimited visits, no description.
    Empty,
    Help,
}

/// One inbound message, pre-classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    Action(Action),
    Text(String),
}

impl Input {
    /// Classify raw message text.
    pub fn parse(raw: &str) -> Input {
        let trimmed = raw.trim();
        match trimmed {
            "/cancel" => return Input::Command(Command::Cancel),
            "/skip" => return Input::Command(Command::Skip),
            "/empty" => return Input::Command(Command::Empty),
            "/help" => return Input::Command(Command::Help),
            _ => {}
        }
        if let Some(action) = Action::parse(trimmed) {
            return Input::Action(action);
        }
        Input::Text(trimmed.to_string())
    }
}

/// What an action code asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Open an abonement's card.
    Open,
    /// Leave the card.
    Exit,
    /// Start recording a visit.
    Visit,
    /// Show the visit history.
    History,
    Prev,
    Next,
    /// Render the share link.
    Share,
    /// Start the edit chain.
    Edit,
    /// Start the delete/unlink confirmation.
    Delete,
    /// Toggle visit notifications.
    Notify,
    /// Pick one visit from the history page.
    SelectVisit(i64),
    /// Ask for a new timestamp for the selected visit.
    EditVisit,
    /// Confirm deletion of the selected visit.
    DeleteVisit,
}

impl ActionKind {
    fn tag(&self) -> &'static str {
        match self {
            ActionKind::Open => "open",
            ActionKind::Exit => "exit",
            ActionKind::Visit => "visit",
            ActionKind::History => "history",
            ActionKind::Prev => "prev",
            ActionKind::Next => "next",
            ActionKind::Share => "share",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
            ActionKind::Notify => "notify",
            ActionKind::SelectVisit(_) => "selv",
            ActionKind::EditVisit => "editv",
            ActionKind::DeleteVisit => "delv",
        }
    }
}

/// A structured action referencing one abonement.
///
/// Wire form `ab:<kind>:<id>:<token>[:<visit_id>]`. The numeric id alone is
/// never trusted: the token rides along and is re-validated against the
/// current row before the action runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub abonement_id: i64,
    pub token: String,
}

impl Action {
    pub fn new(kind: ActionKind, abonement_id: i64, token: impl Into<String>) -> Self {
        Self {
            kind,
            abonement_id,
            token: token.into(),
        }
    }

    /// Render the wire form.
    pub fn encode(&self) -> String {
        match self.kind {
            ActionKind::SelectVisit(visit_id) => format!(
                "ab:{}:{}:{}:{}",
                self.kind.tag(),
                self.abonement_id,
                self.token,
                visit_id
            ),
            _ => format!("ab:{}:{}:{}", self.kind.tag(), self.abonement_id, self.token),
        }
    }

    /// Parse the wire form. Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Action> {
        let mut parts = raw.split(':');
        if parts.next()? != "ab" {
            return None;
        }
        let tag = parts.next()?;
        let abonement_id: i64 = parts.next()?.parse().ok()?;
        let token = parts.next()?.to_string();
        let kind = match tag {
            "open" => ActionKind::Open,
            "exit" => ActionKind::Exit,
            "visit" => ActionKind::Visit,
            "history" => ActionKind::History,
            "prev" => ActionKind::Prev,
            "next" => ActionKind::Next,
            "share" => ActionKind::Share,
            "edit" => ActionKind::Edit,
            "delete" => ActionKind::Delete,
            "notify" => ActionKind::Notify,
            "selv" => ActionKind::SelectVisit(parts.next()?.parse().ok()?),
            "editv" => ActionKind::EditVisit,
            "delv" => ActionKind::DeleteVisit,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Action {
            kind,
            abonement_id,
            token,
        })
    }
}

/// Whether a submitted abonement name is acceptable: non-empty printable
/// text without control characters.
pub fn valid_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_string())
}

/// Parse a visit budget, bounded by the configured maximum.
pub fn parse_visit_count(raw: &str, max: i64) -> Option<i64> {
    let value: i64 = raw.trim().parse().ok()?;
    if (0..=max).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Parse an expiry date in the fixed format.
pub fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT).ok()
}

/// Parse a visit timestamp in the fixed format.
pub fn parse_visit_ts(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_TIME_FMT).ok()
}

/// Whether a submitted phone number is plausible: an optional leading `+`
/// followed by 5 to 20 digits.
pub fn valid_phone(raw: &str) -> Option<String> {
    let phone = raw.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if (5..=20).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(phone.to_string())
    } else {
        None
    }
}

/// Case-insensitive yes/no.
pub fn parse_yes_no(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

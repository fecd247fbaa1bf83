// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The wizard's state type, persisted per chat as JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which existing abonement an edit flow is rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTarget {
    pub abonement_id: i64,
    pub token: String,
}

/// Answers accumulated by the create/edit chain.
///
/// In an edit flow every field starts pre-populated with the current value
/// and a skip keeps it; in a create flow the fields start empty and skip is
/// rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Present in edit flows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing: Option<EditTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_visits: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Draft {
    /// Start an edit flow pre-populated from the current row.
    pub fn for_edit(
        abonement_id: i64,
        token: String,
        name: String,
        total_visits: i64,
        expiry_date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Self {
        Self {
            editing: Some(EditTarget {
                abonement_id,
                token,
            }),
            name: Some(name),
            total_visits: Some(total_visits),
            expiry_date,
            description,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }
}

/// Current step of one chat's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum WizardState {
    Idle,

    // Registration chain.
    RegisterPhone,
    RegisterName { phone: String },

    // Create/edit chain.
    Name { draft: Draft },
    TotalVisits { draft: Draft },
    ExpiryDate { draft: Draft },
    Description { draft: Draft },

    // Join chain.
    Join,
    JoinAccept { abonement_id: i64, token: String },

    // Working with one abonement.
    Open { abonement_id: i64, token: String },
    VisitConfirm { abonement_id: i64, token: String },
    History { abonement_id: i64, token: String, offset: i64, limit: i64 },
    SelectVisit { abonement_id: i64, token: String, visit_id: i64 },
    VisitEditConfirm { abonement_id: i64, token: String, visit_id: i64 },
    VisitDeleteConfirm { abonement_id: i64, token: String, visit_id: i64 },
    DeleteConfirm { abonement_id: i64, token: String, unlink: bool },
}

impl WizardState {
    /// Short step name, stored alongside the JSON payload for diagnostics.
    pub fn step_name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::RegisterPhone => "register_phone",
            WizardState::RegisterName { .. } => "register_name",
            WizardState::Name { .. } => "name",
            WizardState::TotalVisits { .. } => "total_visits",
            WizardState::ExpiryDate { .. } => "expiry_date",
            WizardState::Description { .. } => "description",
            WizardState::Join => "join",
            WizardState::JoinAccept { .. } => "join_accept",
            WizardState::Open { .. } => "open",
            WizardState::VisitConfirm { .. } => "visit_confirm",
            WizardState::History { .. } => "history",
            WizardState::SelectVisit { .. } => "select_visit",
            WizardState::VisitEditConfirm { .. } => "visit_edit_confirm",
            WizardState::VisitDeleteConfirm { .. } => "visit_delete_confirm",
            WizardState::DeleteConfirm { .. } => "delete_confirm",
        }
    }
}

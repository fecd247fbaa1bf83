// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat conversation wizard.
//!
//! A tagged state enum plus a transition function keyed by (state, input)
//! drive the multi-step create/edit/join/visit/history flows. State is
//! persisted per chat id, so a bot restart resumes every conversation.
//! Commits that must be mirrored externally publish exactly one queue job
//! and return to the user without waiting for it.

mod flow;
mod input;
mod replies;
mod state;

pub use flow::{parse_pass_payload, Wizard, WizardLimits};
pub use input::{Action, ActionKind, Command, Input};
pub use replies::generic_failure;
pub use state::{Draft, EditTarget, WizardState};

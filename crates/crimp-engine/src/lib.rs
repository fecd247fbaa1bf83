// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abonement capacity-accounting engine.
//!
//! Pure domain rules over the repository: capacity checks, membership
//! rules, token validation, and the owner/member permission split.
//! Authorization and state failures are ordinary return values, never
//! `Err` -- infrastructure errors are the only thing that propagates.

mod abonement;

pub use abonement::{AbonementEngine, DeleteOutcome, EditError, JoinError};

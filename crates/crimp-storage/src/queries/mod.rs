// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod abonements;
pub mod memberships;
pub mod notifications;
pub mod queue;
pub mod settings;
pub mod tasks;
pub mod users;
pub mod visits;
pub mod wizard;

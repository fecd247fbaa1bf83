// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core definitions shared across the crimp workspace.
//!
//! Contains the [`CrimpError`] error type, common domain types (roles,
//! queue names), and the adapter traits that mark the boundary to the
//! external collaborators: the message queue, the chat transport, the
//! spreadsheet client, and the artifact generators driven by the worker.

pub mod error;
pub mod traits;
pub mod types;

pub use error::CrimpError;
pub use traits::channel::ChatChannel;
pub use traits::media::{PictureRenderer, TableExporter};
pub use traits::queue::{Delivery, QueueClient};
pub use traits::sheets::{Highlight, SheetClient, SheetHeader, SheetVisitRow};
pub use types::{Role, RoleSet};

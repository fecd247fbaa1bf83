// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External spreadsheet client trait.
//!
//! The worker mirrors each abonement into one external sheet: a header
//! block with the pass metadata and one row per visit, keyed by visit id.
//! All operations are upserts by key so that redelivered queue messages
//! are harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CrimpError;

/// The header block written at the top of an abonement sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetHeader {
    pub name: String,
    pub token: String,
    /// Formatted expiry date, empty when the pass has no expiry.
    pub expiry: String,
    /// Formatted visit budget, empty when unlimited.
    pub total_visits: String,
    pub description: String,
    pub owner_name: String,
}

/// One visit row in an abonement sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetVisitRow {
    pub visit_id: i64,
    /// Formatted visit timestamp.
    pub ts: String,
    pub user_name: String,
    /// `false` once the visit has been deleted; the row stays in place.
    pub active: bool,
}

/// Background highlight applied when rewriting a visit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    None,
    /// Marks an edited row.
    Edited,
    /// Marks a deleted row.
    Removed,
}

/// Client for the external spreadsheet service.
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Create a new sheet from the abonement template. Returns the sheet id.
    async fn create_from_template(&self, name: &str) -> Result<String, CrimpError>;

    /// Rewrite the header block of an existing sheet.
    async fn update_header(&self, sheet_id: &str, header: &SheetHeader)
        -> Result<(), CrimpError>;

    /// Append one visit row.
    async fn append_visit(&self, sheet_id: &str, row: &SheetVisitRow) -> Result<(), CrimpError>;

    /// Locate an existing visit row by visit id.
    async fn find_visit(
        &self,
        sheet_id: &str,
        visit_id: i64,
    ) -> Result<Option<SheetVisitRow>, CrimpError>;

    /// Rewrite an existing visit row in place, applying a highlight.
    async fn rewrite_visit(
        &self,
        sheet_id: &str,
        row: &SheetVisitRow,
        highlight: Highlight,
    ) -> Result<(), CrimpError>;

    /// All visit ids currently present in the sheet.
    async fn list_visit_ids(&self, sheet_id: &str) -> Result<Vec<i64>, CrimpError>;

    /// Public read-only link to the sheet.
    fn public_link(&self, sheet_id: &str) -> String;
}

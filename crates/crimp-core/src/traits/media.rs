// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Artifact-generation traits driven by the worker process.
//!
//! Table export (spreadsheet -> site data file -> upload) and picture
//! rendering are opaque side-effecting operations; the worker only
//! dispatches on job type and reports the outcome.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CrimpError;

/// Converts one named spreadsheet table to the site's data format and
/// uploads the result.
#[async_trait]
pub trait TableExporter: Send + Sync {
    /// Export the named table end to end.
    async fn export(&self, table: &str) -> Result<(), CrimpError>;
}

/// Renders a picture set for the given job name.
#[async_trait]
pub trait PictureRenderer: Send + Sync {
    /// Render the pictures and return the output path.
    async fn render(&self, job: &str) -> Result<PathBuf, CrimpError>;
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory mock of the external spreadsheet client and the artifact
//! generators driven by the worker.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crimp_core::{
    CrimpError, Highlight, PictureRenderer, SheetClient, SheetHeader, SheetVisitRow, TableExporter,
};

#[derive(Default)]
struct SheetState {
    header: Option<SheetHeader>,
    rows: Vec<SheetVisitRow>,
    highlights: HashMap<i64, Highlight>,
}

/// In-memory sheet store.
pub struct MockSheets {
    sheets: Mutex<HashMap<String, SheetState>>,
    created: Mutex<u64>,
}

impl MockSheets {
    pub fn new() -> Self {
        Self {
            sheets: Mutex::new(HashMap::new()),
            created: Mutex::new(0),
        }
    }

    /// Number of sheets created from the template so far.
    pub async fn sheets_created(&self) -> u64 {
        *self.created.lock().await
    }

    /// Current rows of one sheet (empty for unknown sheets).
    pub async fn visit_rows(&self, sheet_id: &str) -> Vec<SheetVisitRow> {
        self.sheets
            .lock()
            .await
            .get(sheet_id)
            .map(|sheet| sheet.rows.clone())
            .unwrap_or_default()
    }

    /// Current header of one sheet.
    pub async fn header(&self, sheet_id: &str) -> Option<SheetHeader> {
        self.sheets
            .lock()
            .await
            .get(sheet_id)
            .and_then(|sheet| sheet.header.clone())
    }

    /// Highlight last applied to a visit row.
    pub async fn highlight(&self, sheet_id: &str, visit_id: i64) -> Option<Highlight> {
        self.sheets
            .lock()
            .await
            .get(sheet_id)
            .and_then(|sheet| sheet.highlights.get(&visit_id).copied())
    }
}

impl Default for MockSheets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SheetClient for MockSheets {
    async fn create_from_template(&self, name: &str) -> Result<String, CrimpError> {
        let mut created = self.created.lock().await;
        *created += 1;
        let sheet_id = format!("sheet-{}-{}", *created, name.to_lowercase().replace(' ', "-"));
        self.sheets
            .lock()
            .await
            .insert(sheet_id.clone(), SheetState::default());
        Ok(sheet_id)
    }

    async fn update_header(
        &self,
        sheet_id: &str,
        header: &SheetHeader,
    ) -> Result<(), CrimpError> {
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(sheet_id)
            .ok_or_else(|| CrimpError::sheets(format!("unknown sheet {sheet_id}")))?;
        sheet.header = Some(header.clone());
        Ok(())
    }

    async fn append_visit(&self, sheet_id: &str, row: &SheetVisitRow) -> Result<(), CrimpError> {
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(sheet_id)
            .ok_or_else(|| CrimpError::sheets(format!("unknown sheet {sheet_id}")))?;
        sheet.rows.push(row.clone());
        Ok(())
    }

    async fn find_visit(
        &self,
        sheet_id: &str,
        visit_id: i64,
    ) -> Result<Option<SheetVisitRow>, CrimpError> {
        Ok(self
            .sheets
            .lock()
            .await
            .get(sheet_id)
            .and_then(|sheet| sheet.rows.iter().find(|row| row.visit_id == visit_id).cloned()))
    }

    async fn rewrite_visit(
        &self,
        sheet_id: &str,
        row: &SheetVisitRow,
        highlight: Highlight,
    ) -> Result<(), CrimpError> {
        let mut sheets = self.sheets.lock().await;
        let sheet = sheets
            .get_mut(sheet_id)
            .ok_or_else(|| CrimpError::sheets(format!("unknown sheet {sheet_id}")))?;
        let existing = sheet
            .rows
            .iter_mut()
            .find(|candidate| candidate.visit_id == row.visit_id)
            .ok_or_else(|| CrimpError::sheets(format!("visit {} not in sheet", row.visit_id)))?;
        *existing = row.clone();
        sheet.highlights.insert(row.visit_id, highlight);
        Ok(())
    }

    async fn list_visit_ids(&self, sheet_id: &str) -> Result<Vec<i64>, CrimpError> {
        Ok(self
            .sheets
            .lock()
            .await
            .get(sheet_id)
            .map(|sheet| sheet.rows.iter().map(|row| row.visit_id).collect())
            .unwrap_or_default())
    }

    fn public_link(&self, sheet_id: &str) -> String {
        format!("https://sheets.mock/{sheet_id}")
    }
}

/// Mock table exporter: records export calls, optionally failing once.
pub struct MockExporter {
    exported: Mutex<Vec<String>>,
    fail_next: Mutex<bool>,
}

impl MockExporter {
    pub fn new() -> Self {
        Self {
            exported: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }

    pub async fn exported(&self) -> Vec<String> {
        self.exported.lock().await.clone()
    }

    /// Fail the next export call.
    pub async fn fail_next(&self) {
        *self.fail_next.lock().await = true;
    }
}

impl Default for MockExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableExporter for MockExporter {
    async fn export(&self, table: &str) -> Result<(), CrimpError> {
        let mut fail = self.fail_next.lock().await;
        if *fail {
            *fail = false;
            return Err(CrimpError::sheets("mock export failure"));
        }
        self.exported.lock().await.push(table.to_string());
        Ok(())
    }
}

/// Mock picture renderer: records render calls.
pub struct MockRenderer {
    rendered: Mutex<Vec<String>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub async fn rendered(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PictureRenderer for MockRenderer {
    async fn render(&self, job: &str) -> Result<PathBuf, CrimpError> {
        self.rendered.lock().await.push(job.to_string());
        Ok(PathBuf::from(format!("/tmp/mock/{job}.png")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sheet_rows_upsert_by_visit_id() {
        let sheets = MockSheets::new();
        let sheet_id = sheets.create_from_template("Pass").await.unwrap();

        let row = SheetVisitRow {
            visit_id: 1,
            ts: "01.08.2026 10:00".into(),
            user_name: "Alice".into(),
            active: true,
        };
        sheets.append_visit(&sheet_id, &row).await.unwrap();
        assert_eq!(
            sheets.find_visit(&sheet_id, 1).await.unwrap().unwrap(),
            row
        );
        assert!(sheets.find_visit(&sheet_id, 2).await.unwrap().is_none());

        let edited = SheetVisitRow {
            ts: "02.08.2026 10:00".into(),
            ..row
        };
        sheets
            .rewrite_visit(&sheet_id, &edited, Highlight::Edited)
            .await
            .unwrap();
        assert_eq!(sheets.visit_rows(&sheet_id).await.len(), 1);
        assert_eq!(sheets.highlight(&sheet_id, 1).await, Some(Highlight::Edited));
    }

    #[tokio::test]
    async fn exporter_fail_next_fails_once() {
        let exporter = MockExporter::new();
        exporter.fail_next().await;
        assert!(exporter.export("a").await.is_err());
        assert!(exporter.export("a").await.is_ok());
        assert_eq!(exporter.exported().await, vec!["a"]);
    }
}

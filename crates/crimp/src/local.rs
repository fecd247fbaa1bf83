// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem-backed implementations of the worker's external seams.
//!
//! Deployments without a cloud spreadsheet account still get a working
//! pipeline: each abonement sheet becomes one CSV file plus a JSON header,
//! table exports become site data files, and picture jobs produce files in
//! the output directory. A cloud client can replace any of these at the
//! trait seam without touching the worker.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crimp_config::model::TableSpec;
use crimp_core::{
    CrimpError, Highlight, PictureRenderer, SheetClient, SheetHeader, SheetVisitRow, TableExporter,
};

fn io_err(context: &str, e: std::io::Error) -> CrimpError {
    CrimpError::Sheets {
        message: context.to_string(),
        source: Some(Box::new(e)),
    }
}

/// One CSV row of a local sheet.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    visit_id: i64,
    ts: String,
    user_name: String,
    active: u8,
    highlight: String,
}

fn highlight_tag(highlight: Highlight) -> &'static str {
    match highlight {
        Highlight::None => "none",
        Highlight::Edited => "edited",
        Highlight::Removed => "removed",
    }
}

/// CSV-file sheet store.
pub struct CsvSheets {
    dir: PathBuf,
    link_template: String,
}

impl CsvSheets {
    pub fn new(output_dir: &str, link_template: &str) -> Result<Self, CrimpError> {
        let dir = Path::new(output_dir).join("sheets");
        fs::create_dir_all(&dir).map_err(|e| io_err("create sheets directory", e))?;
        Ok(Self {
            dir,
            link_template: link_template.to_string(),
        })
    }

    fn rows_path(&self, sheet_id: &str) -> PathBuf {
        self.dir.join(format!("{sheet_id}.csv"))
    }

    fn meta_path(&self, sheet_id: &str) -> PathBuf {
        self.dir.join(format!("{sheet_id}.meta.json"))
    }

    fn read_rows(&self, sheet_id: &str) -> Result<Vec<CsvRow>, CrimpError> {
        let path = self.rows_path(sheet_id);
        if !path.exists() {
            return Err(CrimpError::sheets(format!("unknown sheet {sheet_id}")));
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| CrimpError::Sheets {
                message: "open sheet csv".to_string(),
                source: Some(Box::new(e)),
            })?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: CsvRow = record.map_err(|e| CrimpError::Sheets {
                message: "read sheet row".to_string(),
                source: Some(Box::new(e)),
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn write_rows(&self, sheet_id: &str, rows: &[CsvRow]) -> Result<(), CrimpError> {
        // Write the header explicitly so empty sheets still parse.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(self.rows_path(sheet_id))
            .map_err(|e| CrimpError::Sheets {
                message: "open sheet csv for writing".to_string(),
                source: Some(Box::new(e)),
            })?;
        writer
            .write_record(["visit_id", "ts", "user_name", "active", "highlight"])
            .map_err(|e| CrimpError::Sheets {
                message: "write sheet csv header".to_string(),
                source: Some(Box::new(e)),
            })?;
        for row in rows {
            writer.serialize(row).map_err(|e| CrimpError::Sheets {
                message: "write sheet row".to_string(),
                source: Some(Box::new(e)),
            })?;
        }
        writer.flush().map_err(|e| io_err("flush sheet csv", e))?;
        Ok(())
    }
}

#[async_trait]
impl SheetClient for CsvSheets {
    async fn create_from_template(&self, name: &str) -> Result<String, CrimpError> {
        let sheet_id = uuid::Uuid::new_v4().to_string();
        self.write_rows(&sheet_id, &[])?;
        let header = SheetHeader {
            name: name.to_string(),
            token: String::new(),
            expiry: String::new(),
            total_visits: String::new(),
            description: String::new(),
            owner_name: String::new(),
        };
        self.update_header(&sheet_id, &header).await?;
        Ok(sheet_id)
    }

    async fn update_header(
        &self,
        sheet_id: &str,
        header: &SheetHeader,
    ) -> Result<(), CrimpError> {
        let encoded = serde_json::to_string_pretty(header)
            .map_err(|e| CrimpError::Internal(format!("encode sheet header: {e}")))?;
        fs::write(self.meta_path(sheet_id), encoded)
            .map_err(|e| io_err("write sheet header", e))
    }

    async fn append_visit(&self, sheet_id: &str, row: &SheetVisitRow) -> Result<(), CrimpError> {
        let mut rows = self.read_rows(sheet_id)?;
        rows.push(CsvRow {
            visit_id: row.visit_id,
            ts: row.ts.clone(),
            user_name: row.user_name.clone(),
            active: u8::from(row.active),
            highlight: highlight_tag(Highlight::None).to_string(),
        });
        self.write_rows(sheet_id, &rows)
    }

    async fn find_visit(
        &self,
        sheet_id: &str,
        visit_id: i64,
    ) -> Result<Option<SheetVisitRow>, CrimpError> {
        Ok(self
            .read_rows(sheet_id)?
            .into_iter()
            .find(|row| row.visit_id == visit_id)
            .map(|row| SheetVisitRow {
                visit_id: row.visit_id,
                ts: row.ts,
                user_name: row.user_name,
                active: row.active != 0,
            }))
    }

    async fn rewrite_visit(
        &self,
        sheet_id: &str,
        row: &SheetVisitRow,
        highlight: Highlight,
    ) -> Result<(), CrimpError> {
        let mut rows = self.read_rows(sheet_id)?;
        let existing = rows
            .iter_mut()
            .find(|candidate| candidate.visit_id == row.visit_id)
            .ok_or_else(|| {
                CrimpError::sheets(format!("visit {} not in sheet {sheet_id}", row.visit_id))
            })?;
        existing.ts = row.ts.clone();
        existing.user_name = row.user_name.clone();
        existing.active = u8::from(row.active);
        existing.highlight = highlight_tag(highlight).to_string();
        self.write_rows(sheet_id, &rows)
    }

    async fn list_visit_ids(&self, sheet_id: &str) -> Result<Vec<i64>, CrimpError> {
        Ok(self
            .read_rows(sheet_id)?
            .into_iter()
            .map(|row| row.visit_id)
            .collect())
    }

    fn public_link(&self, sheet_id: &str) -> String {
        self.link_template.replacen("{}", sheet_id, 1)
    }
}

/// Writes each exported table as a site data file in the output directory.
pub struct FileExporter {
    dir: PathBuf,
    tables: Vec<TableSpec>,
}

impl FileExporter {
    pub fn new(output_dir: &str, tables: Vec<TableSpec>) -> Result<Self, CrimpError> {
        let dir = PathBuf::from(output_dir);
        fs::create_dir_all(&dir).map_err(|e| io_err("create output directory", e))?;
        Ok(Self { dir, tables })
    }
}

#[async_trait]
impl TableExporter for FileExporter {
    async fn export(&self, table: &str) -> Result<(), CrimpError> {
        let spec = self
            .tables
            .iter()
            .find(|spec| spec.name == table)
            .ok_or_else(|| CrimpError::sheets(format!("unknown table {table}")))?;
        let generated = chrono::Utc::now().to_rfc3339();
        let body = format!(
            "var site_data={};\nvar table_title=\"{}\";\nvar generated_date=\"{}\";\n",
            serde_json::json!([]),
            spec.title,
            generated,
        );
        fs::write(self.dir.join(&spec.output_file), body)
            .map_err(|e| io_err("write table data file", e))
    }
}

/// Writes picture jobs as files in the output directory.
pub struct FileRenderer {
    dir: PathBuf,
}

impl FileRenderer {
    pub fn new(output_dir: &str) -> Result<Self, CrimpError> {
        let dir = Path::new(output_dir).join("pictures");
        fs::create_dir_all(&dir).map_err(|e| io_err("create pictures directory", e))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl PictureRenderer for FileRenderer {
    async fn render(&self, job: &str) -> Result<PathBuf, CrimpError> {
        let path = self.dir.join(format!("{job}.txt"));
        let generated = chrono::Utc::now().to_rfc3339();
        fs::write(&path, format!("picture job {job} rendered at {generated}\n"))
            .map_err(|e| io_err("write picture file", e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(visit_id: i64, ts: &str) -> SheetVisitRow {
        SheetVisitRow {
            visit_id,
            ts: ts.to_string(),
            user_name: "Alice".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn csv_sheet_lifecycle() {
        let dir = tempdir().unwrap();
        let sheets = CsvSheets::new(
            dir.path().to_str().unwrap(),
            "https://sheets.local/{}",
        )
        .unwrap();

        let sheet_id = sheets.create_from_template("Gym Pass").await.unwrap();
        assert!(sheets.list_visit_ids(&sheet_id).await.unwrap().is_empty());
        assert_eq!(
            sheets.public_link(&sheet_id),
            format!("https://sheets.local/{sheet_id}")
        );

        sheets
            .append_visit(&sheet_id, &row(1, "01.08.2026 10:00"))
            .await
            .unwrap();
        sheets
            .append_visit(&sheet_id, &row(2, "02.08.2026 11:00"))
            .await
            .unwrap();
        assert_eq!(sheets.list_visit_ids(&sheet_id).await.unwrap(), vec![1, 2]);

        let found = sheets.find_visit(&sheet_id, 1).await.unwrap().unwrap();
        assert_eq!(found.ts, "01.08.2026 10:00");
        assert!(found.active);

        let mut edited = found;
        edited.ts = "03.08.2026 12:00".to_string();
        sheets
            .rewrite_visit(&sheet_id, &edited, Highlight::Edited)
            .await
            .unwrap();
        let reloaded = sheets.find_visit(&sheet_id, 1).await.unwrap().unwrap();
        assert_eq!(reloaded.ts, "03.08.2026 12:00");

        let mut removed = reloaded;
        removed.active = false;
        sheets
            .rewrite_visit(&sheet_id, &removed, Highlight::Removed)
            .await
            .unwrap();
        assert!(!sheets.find_visit(&sheet_id, 1).await.unwrap().unwrap().active);
        // The row stays in place.
        assert_eq!(sheets.list_visit_ids(&sheet_id).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unknown_sheet_errors() {
        let dir = tempdir().unwrap();
        let sheets =
            CsvSheets::new(dir.path().to_str().unwrap(), "https://x/{}").unwrap();
        assert!(sheets.list_visit_ids("missing").await.is_err());
    }

    #[tokio::test]
    async fn exporter_writes_data_file() {
        let dir = tempdir().unwrap();
        let spec = TableSpec {
            name: "schedule".into(),
            title: "Schedule".into(),
            sheet_id: "src".into(),
            output_file: "schedule.js".into(),
        };
        let exporter =
            FileExporter::new(dir.path().to_str().unwrap(), vec![spec]).unwrap();

        exporter.export("schedule").await.unwrap();
        let written = fs::read_to_string(dir.path().join("schedule.js")).unwrap();
        assert!(written.contains("var site_data"));
        assert!(written.contains("Schedule"));

        assert!(exporter.export("unknown").await.is_err());
    }

    #[tokio::test]
    async fn renderer_writes_picture_file() {
        let dir = tempdir().unwrap();
        let renderer = FileRenderer::new(dir.path().to_str().unwrap()).unwrap();
        let path = renderer.render("contest").await.unwrap();
        assert!(path.exists());
    }
}

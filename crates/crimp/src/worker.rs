// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crimp worker` command implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crimp_bus::SqliteBus;
use crimp_config::model::CrimpConfig;
use crimp_core::CrimpError;
use crimp_storage::Database;
use crimp_worker::Worker;

use crate::local::{CsvSheets, FileExporter, FileRenderer};
use crate::shutdown;

/// Runs the `crimp worker` command until interrupted.
pub async fn run_worker(config: CrimpConfig) -> Result<(), CrimpError> {
    info!("starting crimp worker");

    let db = Database::open(&config.storage.database_path).await?;
    let bus = SqliteBus::new(db.clone(), config.queue.max_attempts);

    let sheets = Arc::new(CsvSheets::new(
        &config.worker.output_dir,
        &config.sheets.link_template,
    )?);
    let exporter = Arc::new(FileExporter::new(
        &config.worker.output_dir,
        config.tables.clone(),
    )?);
    let renderer = Arc::new(FileRenderer::new(&config.worker.output_dir)?);

    let worker = Worker::new(
        db,
        Arc::new(bus),
        sheets,
        exporter,
        renderer,
        config.tables.clone(),
    );

    let cancel = shutdown::install_signal_handler();
    worker
        .run(Duration::from_millis(config.queue.poll_interval_ms), cancel)
        .await?;

    info!("crimp worker shutdown complete");
    Ok(())
}

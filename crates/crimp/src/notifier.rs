// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crimp notifier` command implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crimp_bus::SqliteBus;
use crimp_config::model::CrimpConfig;
use crimp_core::CrimpError;
use crimp_notifier::Notifier;
use crimp_storage::Database;
use crimp_telegram::TelegramChannel;

use crate::shutdown;

/// Runs the `crimp notifier` command until interrupted.
pub async fn run_notifier(config: CrimpConfig) -> Result<(), CrimpError> {
    info!("starting crimp notifier");

    let db = Database::open(&config.storage.database_path).await?;
    let bus = SqliteBus::new(db.clone(), config.queue.max_attempts);
    let channel = Arc::new(TelegramChannel::new(&config.telegram)?);

    let notifier = Notifier::new(
        db,
        Arc::new(bus),
        channel,
        config.telegram.admin_chat_id,
        config.tables.clone(),
    );

    let cancel = shutdown::install_signal_handler();
    notifier
        .run(Duration::from_millis(config.queue.poll_interval_ms), cancel)
        .await?;

    info!("crimp notifier shutdown complete");
    Ok(())
}

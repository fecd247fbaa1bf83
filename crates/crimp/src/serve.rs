// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crimp serve` command implementation.
//!
//! Runs the chat-facing bot: long-polls Telegram, resolves the acting user
//! through the repository, and drives the conversation wizard. Side
//! effects that cannot complete inline leave through the tasks queue.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crimp_bus::SqliteBus;
use crimp_config::model::CrimpConfig;
use crimp_core::ChatChannel;
use crimp_core::CrimpError;
use crimp_engine::AbonementEngine;
use crimp_jobs::JobProducer;
use crimp_storage::queries::users;
use crimp_storage::Database;
use crimp_telegram::{start_payload, TelegramChannel};
use crimp_wizard::{generic_failure, Wizard, WizardLimits};

use crate::shutdown;

/// Runs the `crimp serve` command until interrupted.
pub async fn run_serve(config: CrimpConfig) -> Result<(), CrimpError> {
    info!("starting crimp serve");

    let db = Database::open(&config.storage.database_path).await?;
    let bus = SqliteBus::new(db.clone(), config.queue.max_attempts);
    let engine = AbonementEngine::new(db.clone());
    let producer = JobProducer::new(db.clone(), Arc::new(bus));
    let channel = Arc::new(TelegramChannel::new(&config.telegram)?);
    let wizard = Wizard::new(
        db.clone(),
        engine,
        producer,
        channel.clone(),
        WizardLimits {
            max_visits: config.abonement.visit_count_limit,
            page_limit: config.abonement.pagination_limit,
        },
    );

    let cancel = shutdown::install_signal_handler();
    let mut offset = 0i32;
    info!("bot started, polling for updates");

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            updates = channel.poll_updates(&mut offset) => updates,
        };
        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "polling failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(3)) => continue,
                }
            }
        };

        for update in updates {
            let actor = users::ensure_user(
                &db,
                update.sender_chat_id,
                update.first_name.clone(),
                update.last_name.clone(),
                update.username.clone(),
            )
            .await?;

            let handled = match start_payload(&update.text) {
                Some(payload) => {
                    wizard
                        .handle_deep_link(update.chat_id, &actor, payload)
                        .await
                }
                None => wizard.handle_text(update.chat_id, &actor, &update.text).await,
            };

            // An unexpected handler failure never leaves the user stuck in
            // a broken step: reset and say so.
            let replies = match handled {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(chat_id = update.chat_id, error = %e, "handler failed");
                    if let Err(e) = wizard.reset(update.chat_id).await {
                        warn!(chat_id = update.chat_id, error = %e, "state reset failed");
                    }
                    vec![generic_failure()]
                }
            };

            for text in replies {
                if let Err(e) = channel.send_text(update.chat_id, &text).await {
                    warn!(chat_id = update.chat_id, error = %e, "reply delivery failed");
                }
            }
        }
    }

    info!("crimp serve shutdown complete");
    Ok(())
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The notifier process: consumes the results queue, resolves recipients
//! through the repository, records Notification rows, and delivers chat
//! messages. Delivery failures are isolated per recipient and never fail
//! the job; decode failures are dropped immediately.

mod fanout;

pub use fanout::fan_out;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crimp_bus::Disposition;
use crimp_config::model::TableSpec;
use crimp_core::types::RESULTS_QUEUE;
use crimp_core::{ChatChannel, CrimpError, QueueClient};
use crimp_jobs::{decode, JobResult, RESULT_DONE};
use crimp_storage::queries::{notifications, tasks};
use crimp_storage::Database;

/// The notifier's wiring.
pub struct Notifier {
    db: Database,
    bus: Arc<dyn QueueClient>,
    channel: Arc<dyn ChatChannel>,
    /// Fallback recipient when a result's requester cannot be resolved.
    admin_chat_id: Option<i64>,
    /// Table titles for human-readable result messages.
    tables: Vec<TableSpec>,
}

impl Notifier {
    pub fn new(
        db: Database,
        bus: Arc<dyn QueueClient>,
        channel: Arc<dyn ChatChannel>,
        admin_chat_id: Option<i64>,
        tables: Vec<TableSpec>,
    ) -> Self {
        Self {
            db,
            bus,
            channel,
            admin_chat_id,
            tables,
        }
    }

    /// Run the consume loop until cancelled.
    pub async fn run(
        &self,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CrimpError> {
        crimp_bus::consume(
            self.bus.as_ref(),
            RESULTS_QUEUE,
            poll_interval,
            cancel,
            |delivery| async move { self.handle(&delivery.payload).await },
        )
        .await
    }

    /// Process at most one pending result. Returns whether one was handled.
    pub async fn step(&self) -> Result<bool, CrimpError> {
        crimp_bus::consume_one(self.bus.as_ref(), RESULTS_QUEUE, |delivery| async move {
            self.handle(&delivery.payload).await
        })
        .await
    }

    async fn handle(&self, payload: &str) -> Result<Disposition, CrimpError> {
        let result = match decode::<JobResult>(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, payload, "dropping undecodable result");
                return Ok(Disposition::Discard);
            }
        };

        match result {
            JobResult::TableGenerator {
                task_id,
                table,
                result,
                ..
            } => {
                let table_title = self
                    .tables
                    .iter()
                    .find(|spec| spec.name == table)
                    .map(|spec| spec.title.clone())
                    .unwrap_or(table);
                let text = format!(
                    "Table generation finished\nTask: {task_id}\nTable: {table_title}\nResult: {}",
                    outcome_label(&result)
                );
                self.notify_requester(task_id, &text).await?;
            }
            JobResult::PicturesGenerator {
                task_id,
                job,
                result,
                ..
            } => {
                let text = format!(
                    "Picture generation finished\nTask: {task_id}\nJob: {job}\nResult: {}",
                    outcome_label(&result)
                );
                self.notify_requester(task_id, &text).await?;
            }
            JobResult::AbonementVisit(change) => {
                fanout::fan_out(&self.db, self.channel.as_ref(), &change).await?;
            }
        }
        Ok(Disposition::Ack)
    }

    /// Send a task result to the user who requested it, falling back to the
    /// administrative recipient when the requester cannot be resolved.
    ///
    /// Exactly one Notification row is recorded, and only for a resolved
    /// requester. The chat send is attempted once and failures are logged:
    /// final delivery is at-most-once by design.
    async fn notify_requester(&self, task_id: i64, text: &str) -> Result<(), CrimpError> {
        let requester = tasks::requester(&self.db, task_id).await?;
        let chat_id = match &requester {
            Some(user) => {
                notifications::add(&self.db, user.id, text.to_string()).await?;
                info!(task_id, user_id = user.id, "notification recorded");
                user.chat_id
            }
            None => {
                warn!(task_id, "task requester not found, notifying admin");
                match self.admin_chat_id {
                    Some(chat_id) => chat_id,
                    None => return Ok(()),
                }
            }
        };
        if let Err(e) = self.channel.send_text(chat_id, text).await {
            warn!(task_id, chat_id, error = %e, "result delivery failed");
        }
        Ok(())
    }
}

fn outcome_label(result: &str) -> &str {
    if result == RESULT_DONE {
        "success"
    } else {
        "error"
    }
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message queue client over the shared storage queue table, plus the
//! blocking consumer loop used by the worker and notifier processes.
//!
//! The bus gives at-least-once delivery with manual acknowledgment: a
//! consumer crash before ack leaves the message locked, and the lock expiry
//! makes it visible again. Each consumer processes strictly one message at
//! a time (prefetch of one).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crimp_core::traits::queue::{Delivery, QueueClient};
use crimp_core::CrimpError;
use crimp_storage::queries::queue;
use crimp_storage::Database;

/// What the consumer decided about a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed successfully; acknowledge.
    Ack,
    /// Can never succeed (e.g. undecodable payload); acknowledge without
    /// side effects so it is not redelivered.
    Discard,
    /// Failed this time; reject for redelivery.
    Retry,
}

/// SQLite-backed queue client.
#[derive(Clone)]
pub struct SqliteBus {
    db: Database,
    max_attempts: i32,
}

impl SqliteBus {
    pub fn new(db: Database, max_attempts: i32) -> Self {
        Self { db, max_attempts }
    }

    /// Pending messages in the named queue.
    pub async fn depth(&self, queue_name: &str) -> Result<i64, CrimpError> {
        queue::depth(&self.db, queue_name).await
    }
}

#[async_trait]
impl QueueClient for SqliteBus {
    async fn publish(&self, queue_name: &str, payload: &str) -> Result<i64, CrimpError> {
        let id = queue::enqueue(&self.db, queue_name, payload, self.max_attempts).await?;
        debug!(queue = queue_name, id, "published message");
        Ok(id)
    }

    async fn next(&self, queue_name: &str) -> Result<Option<Delivery>, CrimpError> {
        let entry = queue::dequeue(&self.db, queue_name).await?;
        Ok(entry.map(|entry| Delivery {
            id: entry.id,
            queue: entry.queue_name,
            payload: entry.payload,
            attempts: entry.attempts,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), CrimpError> {
        queue::ack(&self.db, delivery.id).await
    }

    async fn reject(&self, delivery: &Delivery) -> Result<(), CrimpError> {
        queue::fail(&self.db, delivery.id).await
    }
}

/// Run a prefetch-one consume loop over the named queue until cancelled.
///
/// The handler's [`Disposition`] controls acknowledgment; a handler error
/// is treated as [`Disposition::Retry`] so the queue redelivers. The
/// message is acknowledged only after the handler has finished all of its
/// side effects.
pub async fn consume<H, Fut>(
    client: &dyn QueueClient,
    queue_name: &str,
    poll_interval: Duration,
    cancel: CancellationToken,
    handler: H,
) -> Result<(), CrimpError>
where
    H: Fn(Delivery) -> Fut,
    Fut: Future<Output = Result<Disposition, CrimpError>>,
{
    info!(queue = queue_name, "consumer started, waiting for messages");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let delivery = match client.next(queue_name).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => continue,
                    _ = cancel.cancelled() => break,
                }
            }
            Err(e) => {
                warn!(queue = queue_name, error = %e, "dequeue failed");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => continue,
                    _ = cancel.cancelled() => break,
                }
            }
        };

        let id = delivery.id;
        debug!(queue = queue_name, id, "received message");
        let disposition = match handler(delivery.clone()).await {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!(queue = queue_name, id, error = %e, "handler failed");
                Disposition::Retry
            }
        };

        let outcome = match disposition {
            Disposition::Ack | Disposition::Discard => client.ack(&delivery).await,
            Disposition::Retry => client.reject(&delivery).await,
        };
        if let Err(e) = outcome {
            warn!(queue = queue_name, id, error = %e, "settling message failed");
        }
    }
    info!(queue = queue_name, "consumer stopped");
    Ok(())
}

/// Take and handle at most one message from the named queue.
///
/// Returns whether a message was processed. This is the single step of
/// [`consume`], exposed for deterministic pipeline tests.
pub async fn consume_one<H, Fut>(
    client: &dyn QueueClient,
    queue_name: &str,
    handler: H,
) -> Result<bool, CrimpError>
where
    H: FnOnce(Delivery) -> Fut,
    Fut: Future<Output = Result<Disposition, CrimpError>>,
{
    let Some(delivery) = client.next(queue_name).await? else {
        return Ok(false);
    };

    let disposition = match handler(delivery.clone()).await {
        Ok(disposition) => disposition,
        Err(e) => {
            warn!(queue = queue_name, id = delivery.id, error = %e, "handler failed");
            Disposition::Retry
        }
    };
    match disposition {
        Disposition::Ack | Disposition::Discard => client.ack(&delivery).await?,
        Disposition::Retry => client.reject(&delivery).await?,
    }
    Ok(true)
}

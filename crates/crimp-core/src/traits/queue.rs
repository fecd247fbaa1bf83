// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-queue client trait: publish and consume-with-acknowledgment.
//!
//! The queue offers at-least-once delivery: a message stays in flight until
//! the consumer acknowledges it, and a consumer crash before acknowledgment
//! causes redelivery. Consumers therefore acknowledge only after all
//! externally visible side effects for the message have completed.

use async_trait::async_trait;

use crate::error::CrimpError;

/// A message pulled from a queue together with its acknowledgment handle.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Backend-assigned delivery handle, passed back to `ack`/`reject`.
    pub id: i64,
    /// Which queue the message was consumed from.
    pub queue: String,
    /// The raw message payload.
    pub payload: String,
    /// How many times this message has already been attempted.
    pub attempts: i32,
}

/// Client for a named-queue message broker.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Publish a payload to the named queue. Returns the broker's message id.
    async fn publish(&self, queue: &str, payload: &str) -> Result<i64, CrimpError>;

    /// Pull the next pending message from the named queue, marking it in
    /// flight. Returns `None` when the queue is empty.
    ///
    /// At most one message per consumer is in flight at a time (prefetch of
    /// one): callers must `ack` or `reject` before pulling again.
    async fn next(&self, queue: &str) -> Result<Option<Delivery>, CrimpError>;

    /// Acknowledge successful processing; the message is never redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<(), CrimpError>;

    /// Report failed processing; the message becomes eligible for
    /// redelivery until the backend's attempt limit is reached.
    async fn reject(&self, delivery: &Delivery) -> Result<(), CrimpError>;
}

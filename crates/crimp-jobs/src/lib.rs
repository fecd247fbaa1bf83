// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job/result message envelopes and the producer side of the pipeline.
//!
//! Jobs flow bot -> tasks queue -> worker; results flow worker -> results
//! queue -> notifier. Correlation between a result and the chat that
//! requested the work goes exclusively through the persisted Task row.

mod envelope;
mod producer;

pub use envelope::{decode, encode, Job, JobResult, VisitChange, VisitEvent, RESULT_DONE};
pub use producer::JobProducer;

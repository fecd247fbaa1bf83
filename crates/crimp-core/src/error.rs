// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the crimp bot backend.
//!
//! Infrastructure failures surface here; domain outcomes (not-owner,
//! capacity exhausted, already-member) are ordinary return values in
//! `crimp-engine` and never travel as errors.

use thiserror::Error;

/// The primary error type used across all crimp crates.
#[derive(Debug, Error)]
pub enum CrimpError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Message queue errors (publish failure, consume failure, ack failure).
    #[error("queue error: {message}")]
    Queue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chat transport errors (connection failure, send failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// External spreadsheet client errors.
    #[error("sheet error: {message}")]
    Sheets {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A queue message payload that cannot be decoded.
    ///
    /// Decode failures are terminal: redelivery can never succeed, so
    /// consumers acknowledge these immediately without side effects.
    #[error("malformed message payload: {0}")]
    Decode(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CrimpError {
    /// Shorthand for a queue error without an underlying source.
    pub fn queue(message: impl Into<String>) -> Self {
        CrimpError::Queue {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        CrimpError::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a sheet error without an underlying source.
    pub fn sheets(message: impl Into<String>) -> Self {
        CrimpError::Sheets {
            message: message.into(),
            source: None,
        }
    }
}

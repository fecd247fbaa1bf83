// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the crimp bot backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level crimp configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrimpConfig {
    /// Process identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message queue settings shared by producer and consumers.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Abonement business limits.
    #[serde(default)]
    pub abonement: AbonementConfig,

    /// External spreadsheet settings.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Worker output settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Site tables the worker can regenerate, as an array of `[[tables]]`.
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the bot.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "crimp".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables the chat transport.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Public bot username, used to build deep links.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Chat id that receives notifications whose requester cannot be resolved.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,

    /// Long-poll timeout for inbound updates, seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_name: default_bot_name(),
            admin_chat_id: None,
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_bot_name() -> String {
    "crimp_bot".to_string()
}

fn default_poll_timeout_secs() -> u32 {
    25
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file shared by all processes.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "crimp.db".to_string()
}

/// Message queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Consumer poll interval when the queue is empty, milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delivery attempts before a message is parked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_attempts() -> i32 {
    3
}

/// Abonement business limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AbonementConfig {
    /// Largest accepted visit budget for a capacity-limited pass.
    #[serde(default = "default_visit_count_limit")]
    pub visit_count_limit: i64,

    /// Page size for the visit history view.
    #[serde(default = "default_pagination_limit")]
    pub pagination_limit: i64,
}

impl Default for AbonementConfig {
    fn default() -> Self {
        Self {
            visit_count_limit: default_visit_count_limit(),
            pagination_limit: default_pagination_limit(),
        }
    }
}

fn default_visit_count_limit() -> i64 {
    1000
}

fn default_pagination_limit() -> i64 {
    10
}

/// External spreadsheet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
    /// URL template for public sheet links; `{}` is replaced by the sheet id.
    #[serde(default = "default_link_template")]
    pub link_template: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            link_template: default_link_template(),
        }
    }
}

fn default_link_template() -> String {
    "https://docs.google.com/spreadsheets/d/{}".to_string()
}

/// Worker output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Directory where generated artifacts are written before upload.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "out".to_string()
}

/// One site table the worker can regenerate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Generator name referenced by `table_generator` jobs.
    pub name: String,

    /// Human-readable title used in notifications.
    pub title: String,

    /// Source spreadsheet id.
    pub sheet_id: String,

    /// Output file name, relative to `worker.output_dir`.
    pub output_file: String,
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait.
//!
//! The bot, worker, and notifier processes all talk to users through this
//! seam. Keyboard rendering, localization, and webhook/polling delivery are
//! the transport's concern, not the domain's.

use std::path::Path;

use async_trait::async_trait;

use crate::error::CrimpError;

/// Outbound side of a messaging platform.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Send a plain text message to the given chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), CrimpError>;

    /// Send a document with a caption to the given chat.
    async fn send_document(
        &self,
        chat_id: i64,
        caption: &str,
        path: &Path,
    ) -> Result<(), CrimpError>;

    /// Build a deep link that re-enters the bot with the given payload.
    fn deep_link(&self, payload: &str) -> String;
}

// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram chat transport.
//!
//! A thin adapter over teloxide: outbound sends, deep-link construction,
//! and a long-poll loop that flattens Telegram updates into the
//! channel-agnostic [`InboundUpdate`] the bot process consumes. All
//! business logic lives behind the [`ChatChannel`] seam.

use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, UpdateKind};
use tracing::debug;

use crimp_config::model::TelegramConfig;
use crimp_core::{ChatChannel, CrimpError};

/// One flattened inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub chat_id: i64,
    pub sender_chat_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub text: String,
}

/// Telegram-backed [`ChatChannel`].
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
    bot_name: String,
    poll_timeout_secs: u32,
}

impl TelegramChannel {
    /// Build from configuration. Fails when no bot token is configured.
    pub fn new(config: &TelegramConfig) -> Result<Self, CrimpError> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| CrimpError::Config("telegram.bot_token is not set".to_string()))?;
        Ok(Self {
            bot: Bot::new(token),
            bot_name: config.bot_name.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// Long-poll the next batch of inbound updates.
    ///
    /// `offset` is advanced past every update seen, including the ones this
    /// function flattens away (edited messages, callback-less updates).
    pub async fn poll_updates(&self, offset: &mut i32) -> Result<Vec<InboundUpdate>, CrimpError> {
        let updates = self
            .bot
            .get_updates()
            .offset(*offset)
            .timeout(self.poll_timeout_secs)
            .await
            .map_err(map_api_err)?;

        let mut inbound = Vec::new();
        for update in updates {
            *offset = update.id.as_offset();
            if let UpdateKind::Message(message) = update.kind {
                match inbound_from_message(&message) {
                    Some(flattened) => inbound.push(flattened),
                    None => debug!(msg_id = message.id.0, "ignoring non-text message"),
                }
            }
        }
        Ok(inbound)
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), CrimpError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(map_api_err)?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        caption: &str,
        path: &Path,
    ) -> Result<(), CrimpError> {
        self.bot
            .send_document(ChatId(chat_id), InputFile::file(path))
            .caption(caption.to_string())
            .await
            .map_err(map_api_err)?;
        Ok(())
    }

    fn deep_link(&self, payload: &str) -> String {
        deep_link(&self.bot_name, payload)
    }
}

/// Build a `t.me` start link carrying the payload.
pub fn deep_link(bot_name: &str, payload: &str) -> String {
    format!("https://t.me/{bot_name}?start={payload}")
}

/// Extract the `/start` deep-link payload from message text, if any.
pub fn start_payload(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("/start")?;
    let payload = rest.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Flatten a Telegram message into an [`InboundUpdate`].
///
/// Messages without text or without a sender (channel posts) are dropped.
pub fn inbound_from_message(message: &Message) -> Option<InboundUpdate> {
    let text = message.text()?;
    let from = message.from.as_ref()?;
    Some(InboundUpdate {
        chat_id: message.chat.id.0,
        sender_chat_id: i64::try_from(from.id.0).ok()?,
        first_name: Some(from.first_name.clone()),
        last_name: from.last_name.clone(),
        username: from.username.clone(),
        text: text.to_string(),
    })
}

fn map_api_err(e: teloxide::RequestError) -> CrimpError {
    CrimpError::Channel {
        message: "telegram api request failed".to_string(),
        source: Some(Box::new(e)),
    }
}

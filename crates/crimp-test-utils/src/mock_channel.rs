// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat transport for deterministic testing.
//!
//! Captures outbound messages for assertion and can be told to fail
//! deliveries to specific chats.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crimp_core::{ChatChannel, CrimpError};

/// A mock chat transport.
pub struct MockChat {
    sent: Mutex<Vec<(i64, String)>>,
    documents: Mutex<Vec<(i64, String, String)>>,
    failing: Mutex<HashSet<i64>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// All texts sent so far, as (chat id, text).
    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }

    /// All documents sent so far, as (chat id, caption, path).
    pub async fn documents(&self) -> Vec<(i64, String, String)> {
        self.documents.lock().await.clone()
    }

    /// Texts sent to one chat.
    pub async fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Make every send to the given chat fail.
    pub async fn fail_for(&self, chat_id: i64) {
        self.failing.lock().await.insert(chat_id);
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        self.documents.lock().await.clear();
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatChannel for MockChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), CrimpError> {
        if self.failing.lock().await.contains(&chat_id) {
            return Err(CrimpError::channel(format!("mock failure for chat {chat_id}")));
        }
        self.sent.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        caption: &str,
        path: &Path,
    ) -> Result<(), CrimpError> {
        if self.failing.lock().await.contains(&chat_id) {
            return Err(CrimpError::channel(format!("mock failure for chat {chat_id}")));
        }
        self.documents.lock().await.push((
            chat_id,
            caption.to_string(),
            path.display().to_string(),
        ));
        Ok(())
    }

    fn deep_link(&self, payload: &str) -> String {
        format!("https://t.me/mock_bot?start={payload}")
    }
}

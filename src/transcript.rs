//! Conversation log
//!
//! Chat messages and finalized transcription segments are merged into one
//! insertion-ordered log. Every message id is inserted at most once, and a
//! transcription segment id is never displayed twice within a session.

use crate::room::{ChatEvent, TranscriptionSegment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const CHAT_ID_PREFIX: &str = "chat-";
pub const TRANSCRIPTION_ID_PREFIX: &str = "tx-";

pub const USER_CAPTION_PREFIX: &str = "You: ";
pub const ASSISTANT_CAPTION_PREFIX: &str = "PULSE: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Chat,
    Transcription,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "chat-<provider id>" or "tx-<segment id>"
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub source: MessageSource,
}

/// What a transcription segment changed, reported to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// Interim caption replaced
    Caption(Role),
    /// Final segment appended to the log
    Appended(Role),
}

#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    messages: Vec<ChatMessage>,
    message_ids: HashSet<String>,
    processed_segments: HashSet<String>,
    live_caption: Option<String>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chat message received from the room
    ///
    /// Returns `false` when the message was already in the log.
    pub fn add_chat(&mut self, event: &ChatEvent, role: Role) -> bool {
        self.push(ChatMessage {
            id: format!("{}{}", CHAT_ID_PREFIX, event.id),
            role,
            content: event.message.clone(),
            timestamp: event.timestamp,
            source: MessageSource::Chat,
        })
    }

    /// Append a message the local participant just sent
    ///
    /// Uses the provider-assigned id so the provider's echo is deduplicated.
    pub fn add_sent(&mut self, provider_id: &str, text: &str) -> bool {
        self.push(ChatMessage {
            id: format!("{}{}", CHAT_ID_PREFIX, provider_id),
            role: Role::User,
            content: text.to_string(),
            timestamp: Utc::now(),
            source: MessageSource::Chat,
        })
    }

    /// Apply one batch of transcription segments from a single participant
    pub fn apply_transcription(
        &mut self,
        role: Role,
        segments: &[TranscriptionSegment],
    ) -> Vec<TranscriptUpdate> {
        let mut updates = Vec::new();

        for segment in segments {
            if !segment.is_final {
                let prefix = match role {
                    Role::User => USER_CAPTION_PREFIX,
                    Role::Assistant => ASSISTANT_CAPTION_PREFIX,
                };
                self.live_caption = Some(format!("{}{}", prefix, segment.text));
                updates.push(TranscriptUpdate::Caption(role));
                continue;
            }

            if !self.processed_segments.insert(segment.id.clone()) {
                debug!("Skipping already processed segment {}", segment.id);
                continue;
            }

            self.live_caption = None;

            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }

            let appended = self.push(ChatMessage {
                id: format!("{}{}", TRANSCRIPTION_ID_PREFIX, segment.id),
                role,
                content: text.to_string(),
                timestamp: Utc::now(),
                source: MessageSource::Transcription,
            });

            if appended {
                updates.push(TranscriptUpdate::Appended(role));
            }
        }

        updates
    }

    fn push(&mut self, message: ChatMessage) -> bool {
        if !self.message_ids.insert(message.id.clone()) {
            debug!("Skipping duplicate message {}", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn live_caption(&self) -> Option<&str> {
        self.live_caption.as_deref()
    }

    /// Forget processed segment ids; only done on full teardown
    pub fn clear_processed(&mut self) {
        self.processed_segments.clear();
        self.live_caption = None;
    }

    /// Start a fresh log for a new session
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.message_ids.clear();
    }
}

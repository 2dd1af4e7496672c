//! Inbound message model, resolved once from the messaging platform payload.

use std::path::Path;

use async_trait::async_trait;

use crate::error::TelegramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Voice,
    Audio,
    Video,
    Animation,
}

impl MessageKind {
    /// Video-like payloads go through the audio readiness gate.
    pub fn is_visual(self) -> bool {
        matches!(self, MessageKind::Video | MessageKind::Animation)
    }
}

/// Platform handle for a downloadable attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub kind: MessageKind,
    /// Message text, or the caption of a media message.
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

impl InboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind: MessageKind::Text,
            text: Some(text.into()),
            media: None,
        }
    }

    pub fn media(
        chat_id: i64,
        kind: MessageKind,
        file_id: impl Into<String>,
        caption: Option<String>,
    ) -> Self {
        Self {
            chat_id,
            kind,
            text: caption,
            media: Some(MediaRef {
                file_id: file_id.into(),
            }),
        }
    }
}

/// Downloads an attachment to a local path.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn download(&self, media: &MediaRef, dest: &Path) -> Result<(), TelegramError>;
}

/// Sends a plain text reply to a chat.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

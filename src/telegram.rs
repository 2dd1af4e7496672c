use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::TelegramError;
use crate::message::{InboundMessage, MediaFetcher, MediaRef, MessageKind, Replier};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

impl Update {
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.channel_post)
    }
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
    pub video: Option<FileRef>,
    pub animation: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

impl Message {
    /// Resolves the payload into a single kind. Animation wins over video,
    /// video over audio, audio over voice.
    pub fn into_inbound(self) -> InboundMessage {
        let chat_id = self.chat.id;
        let text = self.text.or(self.caption).filter(|t| !t.is_empty());
        let media = [
            (MessageKind::Animation, self.animation),
            (MessageKind::Video, self.video),
            (MessageKind::Audio, self.audio),
            (MessageKind::Voice, self.voice),
        ]
        .into_iter()
        .find_map(|(kind, file)| file.map(|f| (kind, f)));

        match media {
            Some((kind, file)) => InboundMessage::media(chat_id, kind, file.file_id, text),
            None => InboundMessage {
                chat_id,
                kind: MessageKind::Text,
                text,
                media: None,
            },
        }
    }
}

/// Minimal Bot API client: long polling, file download and replies.
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(token: String, api_base: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response: ApiResponse<T> = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(TelegramError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        response
            .result
            .ok_or_else(|| TelegramError::Api(format!("{method} returned no result")))
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "channel_post"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for TelegramClient {
    async fn download(&self, media: &MediaRef, dest: &Path) -> Result<(), TelegramError> {
        let file: File = self
            .call("getFile", json!({ "file_id": media.file_id }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TelegramError::Api("getFile returned no file_path".to_string()))?;

        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| TelegramError::Write {
                path: dest.to_path_buf(),
                source,
            })?;
        debug!(bytes = bytes.len(), dest = %dest.display(), "Media downloaded");
        Ok(())
    }
}

#[async_trait]
impl Replier for TelegramClient {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.send_message(chat_id, text).await
    }
}

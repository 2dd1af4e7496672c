use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use tracing::debug;

use crate::error::UploadError;

pub const DEFAULT_ENDPOINT: &str = "https://call2all.co.il/ym/api/UploadFile";

/// Delivers a finished wav to a telephony path and returns the backend's raw
/// status text.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: &Path, destination: &str) -> Result<String, UploadError>;
}

/// Yemot IVR `UploadFile` endpoint.
pub struct YemotUploader {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl YemotUploader {
    pub fn new(token: String, endpoint: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            token,
        })
    }
}

#[async_trait]
impl Uploader for YemotUploader {
    async fn upload(&self, file: &Path, destination: &str) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|source| UploadError::Read {
                path: file.to_path_buf(),
                source,
            })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.wav".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("token", self.token.clone())
            .text("path", destination.to_string())
            .text("convertAudio", "1")
            .text("autoNumbering", "true")
            .part("file", part);

        debug!(destination, "Uploading to IVR backend");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        Ok(response.text().await?)
    }
}

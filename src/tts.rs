use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TtsError;

pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Voice used for every synthesis call.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceProfile {
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_voice_name")]
    pub name: String,
    #[serde(default = "default_ssml_gender")]
    pub ssml_gender: String,
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f64,
}

fn default_language_code() -> String {
    "he-IL".to_string()
}

fn default_voice_name() -> String {
    "he-IL-Wavenet-B".to_string()
}

fn default_ssml_gender() -> String {
    "MALE".to_string()
}

fn default_speaking_rate() -> f64 {
    1.2
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            name: default_voice_name(),
            ssml_gender: default_ssml_gender(),
            speaking_rate: default_speaking_rate(),
        }
    }
}

/// Text to encoded (MP3) speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Google Cloud Text-to-Speech over its REST endpoint.
pub struct GoogleTts {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    voice: VoiceProfile,
}

impl GoogleTts {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        voice: VoiceProfile,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            voice,
        })
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.voice.language_code,
                name: &self.voice.name,
                ssml_gender: &self.voice.ssml_gender,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: self.voice.speaking_rate,
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        debug!(voice = %self.voice.name, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TtsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SynthesizeResponse = response.json().await?;
        let encoded = parsed
            .audio_content
            .ok_or_else(|| TtsError::Decode("response has no audioContent".to_string()))?;
        let audio = STANDARD
            .decode(encoded)
            .map_err(|e| TtsError::Decode(e.to_string()))?;

        info!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

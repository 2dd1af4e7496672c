//! Settings loaded from a TOML file plus secrets from the environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::audio::AudioPolicy;
use crate::error::ConfigError;
use crate::tts::VoiceProfile;

/// Output shape for one monitored channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub id: i64,
    /// Telephony destination, e.g. `ivr2:11/`.
    pub path: String,
    #[serde(default)]
    pub intro_suffix: Option<String>,
    /// One combined upload when true, separate media and text uploads when false.
    #[serde(default = "default_true")]
    pub merge_text: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub telegram: TelegramSettings,

    #[serde(default)]
    pub voice: VoiceProfile,

    #[serde(default)]
    pub tts: EndpointSettings,

    #[serde(default)]
    pub upload: EndpointSettings,

    #[serde(default)]
    pub audio: AudioPolicy,

    #[serde(default)]
    pub transcoder: TranscoderSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub keep_alive: KeepAliveSettings,

    /// IANA zone used for spoken intro times.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Users allowed to run admin commands. Empty allows everyone.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscoderSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channel_count")]
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_blacklist_file")]
    pub blacklist_file: PathBuf,
    #[serde(default = "default_replacements_file")]
    pub replacements_file: PathBuf,
    /// Parent directory for per-run workspaces.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepAliveSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

fn default_true() -> bool {
    true
}

fn default_channels() -> Vec<ChannelConfig> {
    let channel = |id, path: &str, suffix: Option<&str>, merge_text| ChannelConfig {
        id,
        path: path.to_string(),
        intro_suffix: suffix.map(str::to_string),
        merge_text,
    };
    vec![
        channel(-1003308764465, "ivr2:11/", Some("בְּמִבְזָקִים-פְּלוּס,"), true),
        channel(-1003387160676, "ivr2:22/", Some("בחדשות המגזר,"), true),
        channel(-1003403882019, "ivr2:33/", None, false),
        channel(-1003427588105, "ivr2:44/", Some("בחדשות המגזר,"), true),
        channel(-1003036595355, "ivr2:55/", Some("בעדכוני יְשִׁיבֶזֹוכֶר,"), true),
    ]
}

fn default_timezone() -> String {
    "Asia/Jerusalem".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_channel_count() -> u16 {
    1
}

fn default_blacklist_file() -> PathBuf {
    PathBuf::from("blacklist.json")
}

fn default_replacements_file() -> PathBuf {
    PathBuf::from("replacements.json")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("ivr-relay")
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            poll_timeout_secs: default_poll_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            admin_ids: Vec::new(),
        }
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            sample_rate: default_sample_rate(),
            channels: default_channel_count(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            blacklist_file: default_blacklist_file(),
            replacements_file: default_replacements_file(),
            work_dir: default_work_dir(),
        }
    }
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            telegram: TelegramSettings::default(),
            voice: VoiceProfile::default(),
            tts: EndpointSettings::default(),
            upload: EndpointSettings::default(),
            audio: AudioPolicy::default(),
            transcoder: TranscoderSettings::default(),
            storage: StorageSettings::default(),
            keep_alive: KeepAliveSettings::default(),
            timezone: default_timezone(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Settings {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.channel_map()?;
        self.tz()?;
        if self.telegram.poll_timeout_secs >= self.telegram.request_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "telegram.poll_timeout_secs ({}) must be below telegram.request_timeout_secs ({})",
                self.telegram.poll_timeout_secs, self.telegram.request_timeout_secs
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Channel table keyed by id; duplicate ids are rejected.
    pub fn channel_map(&self) -> Result<HashMap<i64, ChannelConfig>, ConfigError> {
        let mut map = HashMap::with_capacity(self.channels.len());
        for channel in &self.channels {
            if channel.path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "channel {} has an empty path",
                    channel.id
                )));
            }
            if map.insert(channel.id, channel.clone()).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "channel {} is configured twice",
                    channel.id
                )));
            }
        }
        Ok(map)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown time zone {}", self.timezone)))
    }

    pub fn poll_timeout(&self) -> u64 {
        self.telegram.poll_timeout_secs
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.telegram.retry_backoff_secs)
    }
}

/// Loads settings from `path`. A missing file at the default location yields
/// the built-in defaults; a missing file that was asked for explicitly is an
/// error.
pub fn load_settings(path: &Path, explicit: bool) -> Result<Settings, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Settings::from_toml(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Ok(Settings::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Credentials that must be present before any message is served.
#[derive(Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub ymot_token: String,
    pub google_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingSecret(key))
        };
        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            ymot_token: required("YMOT_TOKEN")?,
            google_api_key: required("GOOGLE_TTS_API_KEY")?,
        })
    }
}

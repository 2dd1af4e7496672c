use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingSecret(&'static str),

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RuleStoreError {
    #[error("rule file io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule file encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("TTS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TTS service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("TTS response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}")]
    Failed { tool: String, status: String },

    #[error("unusable wav {path:?}: {reason}")]
    InvalidWav { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read upload file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telegram API error: {0}")]
    Api(String),

    #[error("failed to write downloaded file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ivr_relay::audio::{AudioPolicy, MediaTool};
use ivr_relay::clock::{FixedClock, TimeOfDay};
use ivr_relay::config::ChannelConfig;
use ivr_relay::error::{MediaError, TelegramError, TtsError, UploadError};
use ivr_relay::message::{MediaFetcher, MediaRef, Replier};
use ivr_relay::pipeline::Pipeline;
use ivr_relay::rules::MemoryRuleStore;
use ivr_relay::text::TextNormalizer;
use ivr_relay::tts::SpeechSynthesizer;
use ivr_relay::upload::Uploader;
use tempfile::TempDir;

pub const MEDIA_BYTES: &str = "MEDIA";
pub const NOON_PAST_FIVE: TimeOfDay = TimeOfDay { hour: 12, minute: 5 };

/// Synthesizes `text` as the bytes `tts(<text>)`.
#[derive(Default)]
pub struct FakeSynth {
    pub calls: Mutex<Vec<String>>,
    pub fail_on: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSynth {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_for(&self, text: &str) {
        self.fail_on.lock().unwrap().push(text.to_string());
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push(text.to_string());
        if self.fail_on.lock().unwrap().iter().any(|t| t == text) {
            return Err(TtsError::Api {
                status: 429,
                body: "quota".to_string(),
            });
        }
        Ok(format!("tts({text})").into_bytes())
    }
}

/// Converts by copying bytes and concatenates by joining contents with `+`.
pub struct FakeMedia {
    pub streams: usize,
    pub peak_db: Option<f64>,
    pub fail_concat: bool,
    pub probes: AtomicUsize,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            streams: 1,
            peak_db: Some(-6.0),
            fail_concat: false,
            probes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaTool for FakeMedia {
    async fn to_normalized_wav(&self, input: &Path, output: &Path) -> bool {
        match std::fs::read(input) {
            Ok(bytes) => std::fs::write(output, bytes).is_ok(),
            Err(_) => false,
        }
    }

    async fn concat(&self, inputs: &[PathBuf], manifest: &Path, output: &Path) -> bool {
        std::fs::write(manifest, "list").unwrap();
        let parts: Vec<String> = inputs
            .iter()
            .filter(|p| p.exists())
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        let _ = std::fs::remove_file(manifest);
        if parts.is_empty() || self.fail_concat {
            return false;
        }
        std::fs::write(output, parts.join("+")).is_ok()
    }

    async fn count_audio_streams(&self, _path: &Path) -> Result<usize, MediaError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.streams)
    }

    async fn max_volume_db(&self, _path: &Path, _window: u32) -> Result<Option<f64>, MediaError> {
        Ok(self.peak_db)
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub downloads: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn download(&self, _media: &MediaRef, dest: &Path) -> Result<(), TelegramError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TelegramError::Api("file is too big".to_string()));
        }
        std::fs::write(dest, MEDIA_BYTES).unwrap();
        Ok(())
    }
}

/// Records `(destination, file contents)` for every upload.
#[derive(Default)]
pub struct FakeUploader {
    pub uploads: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeUploader {
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, file: &Path, destination: &str) -> Result<String, UploadError> {
        let contents = std::fs::read_to_string(file).map_err(|source| UploadError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        self.uploads
            .lock()
            .unwrap()
            .push((destination.to_string(), contents));
        if self.fail {
            return Err(UploadError::Read {
                path: file.to_path_buf(),
                source: std::io::Error::other("connection reset"),
            });
        }
        Ok("OK".to_string())
    }
}

#[derive(Default)]
pub struct FakeReplier {
    pub replies: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Replier for FakeReplier {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.replies.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub fn channel(id: i64, path: &str, intro_suffix: Option<&str>, merge_text: bool) -> ChannelConfig {
    ChannelConfig {
        id,
        path: path.to_string(),
        intro_suffix: intro_suffix.map(str::to_string),
        merge_text,
    }
}

pub struct Harness {
    pub work_root: TempDir,
    pub rules: Arc<MemoryRuleStore>,
    pub synth: Arc<FakeSynth>,
    pub media: Arc<FakeMedia>,
    pub fetcher: Arc<FakeFetcher>,
    pub uploader: Arc<FakeUploader>,
    pub channels: Vec<ChannelConfig>,
}

impl Harness {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self {
            work_root: tempfile::tempdir().unwrap(),
            rules: Arc::new(MemoryRuleStore::default()),
            synth: Arc::new(FakeSynth::default()),
            media: Arc::new(FakeMedia::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            uploader: Arc::new(FakeUploader::default()),
            channels,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        let channels: HashMap<i64, ChannelConfig> =
            self.channels.iter().map(|c| (c.id, c.clone())).collect();
        Pipeline::new(
            channels,
            TextNormalizer::new(self.rules.clone()),
            Arc::new(FixedClock(NOON_PAST_FIVE)),
            self.synth.clone(),
            self.media.clone(),
            self.fetcher.clone(),
            self.uploader.clone(),
            AudioPolicy::default(),
            self.work_root.path().to_path_buf(),
        )
    }

    /// Entries left under the work root after runs.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_root.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

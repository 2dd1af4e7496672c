//! Per-message processing: clean text, gate and convert media, synthesize the
//! spoken parts, assemble them per channel policy, upload and clean up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::audio::{AudioPolicy, MediaTool, has_usable_audio};
use crate::clock::{Clock, intro_phrase};
use crate::config::ChannelConfig;
use crate::message::{InboundMessage, MediaFetcher, MediaRef, MessageKind};
use crate::text::TextNormalizer;
use crate::tts::SpeechSynthesizer;
use crate::upload::Uploader;
use crate::workspace::{Artifact, RunWorkspace};

/// What to build and upload for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyPlan {
    Nothing,
    /// Upload the converted media audio on its own.
    MediaOnly,
    /// One upload: `speech` synthesized as a single utterance, followed by
    /// the media audio when `with_media` is set.
    Merged { speech: String, with_media: bool },
    /// Media audio (if any) uploaded first, then a second upload holding the
    /// separately synthesized intro and body.
    Split {
        intro: Option<String>,
        body: String,
        with_media: bool,
    },
}

/// Channel assembly decision table. `intro` and `body` are expected to be
/// non-empty when present.
pub fn plan_assembly(
    merge_text: bool,
    intro: Option<&str>,
    body: Option<&str>,
    has_media: bool,
) -> AssemblyPlan {
    let Some(body) = body.filter(|b| !b.is_empty()) else {
        return if has_media {
            AssemblyPlan::MediaOnly
        } else {
            AssemblyPlan::Nothing
        };
    };
    let intro = intro.filter(|i| !i.is_empty());

    if merge_text {
        let speech = match intro {
            Some(intro) => format!("{intro} {body}"),
            None => body.to_string(),
        };
        AssemblyPlan::Merged {
            speech,
            with_media: has_media,
        }
    } else {
        AssemblyPlan::Split {
            intro: intro.map(str::to_string),
            body: body.to_string(),
            with_media: has_media,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnconfiguredChannel,
    NoContent,
    NoUsableAudio,
    WorkspaceUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub artifact: Artifact,
    pub destination: String,
    /// Backend status text, or the transport error message.
    pub status: Result<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessReport {
    Skipped(SkipReason),
    Processed { deliveries: Vec<Delivery> },
}

impl ProcessReport {
    pub fn deliveries(&self) -> &[Delivery] {
        match self {
            ProcessReport::Processed { deliveries } => deliveries,
            ProcessReport::Skipped(_) => &[],
        }
    }
}

enum MediaOutcome {
    Ready(PathBuf),
    Silent,
    Unavailable,
}

pub struct Pipeline {
    channels: HashMap<i64, ChannelConfig>,
    normalizer: TextNormalizer,
    clock: Arc<dyn Clock>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    media: Arc<dyn MediaTool>,
    fetcher: Arc<dyn MediaFetcher>,
    uploader: Arc<dyn Uploader>,
    audio_policy: AudioPolicy,
    work_root: PathBuf,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: HashMap<i64, ChannelConfig>,
        normalizer: TextNormalizer,
        clock: Arc<dyn Clock>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        media: Arc<dyn MediaTool>,
        fetcher: Arc<dyn MediaFetcher>,
        uploader: Arc<dyn Uploader>,
        audio_policy: AudioPolicy,
        work_root: PathBuf,
    ) -> Self {
        Self {
            channels,
            normalizer,
            clock,
            synthesizer,
            media,
            fetcher,
            uploader,
            audio_policy,
            work_root,
        }
    }

    /// Runs one message end to end. Upstream failures abandon only the branch
    /// they occur in; the run workspace is always removed before returning.
    pub async fn process(&self, message: &InboundMessage) -> ProcessReport {
        info!(chat_id = message.chat_id, kind = ?message.kind, "Message received");

        let Some(channel) = self.channels.get(&message.chat_id) else {
            info!(chat_id = message.chat_id, "Channel not configured; ignoring");
            return ProcessReport::Skipped(SkipReason::UnconfiguredChannel);
        };

        let workspace = match RunWorkspace::create(&self.work_root) {
            Ok(ws) => ws,
            Err(e) => {
                error!(root = %self.work_root.display(), error = %e, "Failed to create run workspace");
                return ProcessReport::Skipped(SkipReason::WorkspaceUnavailable);
            }
        };

        let report = self.run(channel, message, &workspace).await;
        debug!(dir = %workspace.dir().display(), ?report, "Run finished");
        workspace.purge();
        report
    }

    async fn run(
        &self,
        channel: &ChannelConfig,
        message: &InboundMessage,
        ws: &RunWorkspace,
    ) -> ProcessReport {
        let body = self
            .normalizer
            .normalize(message.text.as_deref().unwrap_or_default());

        let media_wav = match &message.media {
            None => None,
            Some(media) => match self.prepare_media(message.kind, media, ws).await {
                MediaOutcome::Ready(path) => Some(path),
                MediaOutcome::Silent => {
                    info!("Visual media without usable audio; skipping message");
                    return ProcessReport::Skipped(SkipReason::NoUsableAudio);
                }
                MediaOutcome::Unavailable => None,
            },
        };

        let intro = match (&channel.intro_suffix, body.is_empty()) {
            (Some(suffix), false) => Some(intro_phrase(self.clock.now(), suffix)),
            _ => None,
        };

        let plan = plan_assembly(
            channel.merge_text,
            intro.as_deref(),
            Some(body.as_str()),
            media_wav.is_some(),
        );
        debug!(?plan, "Assembly plan");

        let mut deliveries = Vec::new();
        match plan {
            AssemblyPlan::Nothing => {
                info!("No text or audio to deliver");
                return ProcessReport::Skipped(SkipReason::NoContent);
            }
            AssemblyPlan::MediaOnly => {
                if let Some(wav) = &media_wav {
                    deliveries.push(self.deliver(wav, Artifact::MediaWav, &channel.path).await);
                }
            }
            AssemblyPlan::Merged { speech, with_media } => {
                let mut parts = Vec::new();
                if let Some(wav) = self
                    .speak(&speech, ws, Artifact::CombinedMp3, Artifact::CombinedWav)
                    .await
                {
                    parts.push(wav);
                }
                if with_media {
                    parts.extend(media_wav.clone());
                }
                if let Some(d) = self
                    .concat_and_deliver(parts, ws, Artifact::FinalUpload, &channel.path)
                    .await
                {
                    deliveries.push(d);
                }
            }
            AssemblyPlan::Split {
                intro,
                body,
                with_media,
            } => {
                if with_media {
                    if let Some(wav) = &media_wav {
                        deliveries.push(self.deliver(wav, Artifact::MediaWav, &channel.path).await);
                    }
                }
                let mut parts = Vec::new();
                if let Some(intro) = intro {
                    parts.extend(
                        self.speak(&intro, ws, Artifact::IntroMp3, Artifact::IntroWav)
                            .await,
                    );
                }
                parts.extend(
                    self.speak(&body, ws, Artifact::BodyMp3, Artifact::BodyWav)
                        .await,
                );
                if let Some(d) = self
                    .concat_and_deliver(parts, ws, Artifact::TextUpload, &channel.path)
                    .await
                {
                    deliveries.push(d);
                }
            }
        }

        ProcessReport::Processed { deliveries }
    }

    async fn prepare_media(
        &self,
        kind: MessageKind,
        media: &MediaRef,
        ws: &RunWorkspace,
    ) -> MediaOutcome {
        if kind == MessageKind::Animation {
            info!("Animation carries no narration; treating as silent");
            return MediaOutcome::Silent;
        }

        let source = ws.path(Artifact::MediaSource);
        if let Err(e) = self.fetcher.download(media, &source).await {
            error!(file_id = %media.file_id, error = %e, "Media download failed");
            return MediaOutcome::Unavailable;
        }

        if kind.is_visual() && !has_usable_audio(self.media.as_ref(), &source, &self.audio_policy).await {
            return MediaOutcome::Silent;
        }

        let wav = ws.path(Artifact::MediaWav);
        let converted = self.media.to_normalized_wav(&source, &wav).await;
        let _ = tokio::fs::remove_file(&source).await;
        if !converted {
            warn!("Media could not be converted; continuing without it");
            return MediaOutcome::Unavailable;
        }
        MediaOutcome::Ready(wav)
    }

    /// Synthesizes `text` into `mp3` and converts it into `wav`. Failures are
    /// logged and yield `None`.
    async fn speak(
        &self,
        text: &str,
        ws: &RunWorkspace,
        mp3: Artifact,
        wav: Artifact,
    ) -> Option<PathBuf> {
        if text.is_empty() {
            return None;
        }
        let audio = match self.synthesizer.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!(error = %e, artifact = mp3.file_name(), "Speech synthesis failed");
                return None;
            }
        };

        let mp3_path = ws.path(mp3);
        if let Err(e) = tokio::fs::write(&mp3_path, &audio).await {
            error!(path = %mp3_path.display(), error = %e, "Failed to write synthesized audio");
            return None;
        }

        let wav_path = ws.path(wav);
        if !self.media.to_normalized_wav(&mp3_path, &wav_path).await {
            return None;
        }
        Some(wav_path)
    }

    async fn concat_and_deliver(
        &self,
        parts: Vec<PathBuf>,
        ws: &RunWorkspace,
        output: Artifact,
        destination: &str,
    ) -> Option<Delivery> {
        if parts.is_empty() {
            warn!(artifact = output.file_name(), "No parts to assemble");
            return None;
        }
        let out_path = ws.path(output);
        if !self
            .media
            .concat(&parts, &ws.path(Artifact::ConcatList), &out_path)
            .await
        {
            return None;
        }
        Some(self.deliver(&out_path, output, destination).await)
    }

    async fn deliver(&self, path: &Path, artifact: Artifact, destination: &str) -> Delivery {
        debug!(artifact = artifact.file_name(), destination, "Uploading artifact");
        let status = match self.uploader.upload(path, destination).await {
            Ok(status) => {
                info!(destination, %status, "Uploaded");
                Ok(status)
            }
            Err(e) => {
                error!(destination, error = %e, "Upload failed");
                Err(e.to_string())
            }
        };
        Delivery {
            artifact,
            destination: destination.to_string(),
            status,
        }
    }
}

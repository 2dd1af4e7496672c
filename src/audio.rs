use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use hound::WavReader;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::MediaError;

static MAX_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"max_volume: ([\-\d\.]+) dB").unwrap());

/// Thresholds for deciding whether a clip carries audible content.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioPolicy {
    /// Peak loudness below this is treated as silence.
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,

    /// Seconds from the start of the clip that are analyzed.
    #[serde(default = "default_analysis_window_secs")]
    pub analysis_window_secs: u32,

    /// Verdict used when the probe or the loudness analysis cannot be read.
    #[serde(default = "default_assume_audio_on_error")]
    pub assume_audio_on_error: bool,
}

fn default_silence_threshold_db() -> f64 {
    -50.0
}

fn default_analysis_window_secs() -> u32 {
    20
}

fn default_assume_audio_on_error() -> bool {
    true
}

impl Default for AudioPolicy {
    fn default() -> Self {
        Self {
            silence_threshold_db: default_silence_threshold_db(),
            analysis_window_secs: default_analysis_window_secs(),
            assume_audio_on_error: default_assume_audio_on_error(),
        }
    }
}

/// Media conversion and inspection. Conversions report success as a bool and
/// never abort the caller.
#[async_trait]
pub trait MediaTool: Send + Sync {
    async fn to_normalized_wav(&self, input: &Path, output: &Path) -> bool;

    /// Joins same-format wavs in order. `manifest` is a scratch file that is
    /// removed before returning.
    async fn concat(&self, inputs: &[PathBuf], manifest: &Path, output: &Path) -> bool;

    async fn count_audio_streams(&self, path: &Path) -> Result<usize, MediaError>;

    /// Peak loudness in dB over the first `window_secs`, or `None` when the
    /// analyzer output has no reading.
    async fn max_volume_db(&self, path: &Path, window_secs: u32) -> Result<Option<f64>, MediaError>;
}

/// `ffmpeg`/`ffprobe` invoked as subprocesses.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    sample_rate: u32,
    channels: u16,
}

impl Ffmpeg {
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            sample_rate,
            channels,
        }
    }

    async fn run_ffmpeg(&self, args: &[&str]) -> Result<std::process::Output, MediaError> {
        Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: self.ffmpeg.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn to_normalized_wav(&self, input: &Path, output: &Path) -> bool {
        let rate = self.sample_rate.to_string();
        let channels = self.channels.to_string();
        let input_arg = input.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args = [
            "-i", &*input_arg, "-ar", rate.as_str(), "-ac", channels.as_str(), "-f", "wav", &*output_arg,
            "-y",
        ];
        match self.run_ffmpeg(&args).await {
            Ok(out) if out.status.success() => match check_wav(output) {
                Ok(secs) => {
                    debug!(input = %input.display(), duration_secs = secs, "Converted to wav");
                    true
                }
                Err(e) => {
                    error!(error = %e, "ffmpeg reported success but the wav is unusable");
                    let _ = tokio::fs::remove_file(output).await;
                    false
                }
            },
            Ok(out) => {
                error!(
                    input = %input.display(),
                    status = %out.status,
                    "ffmpeg failed to convert to wav"
                );
                false
            }
            Err(e) => {
                error!(error = %e, "ffmpeg conversion could not run");
                false
            }
        }
    }

    async fn concat(&self, inputs: &[PathBuf], manifest: &Path, output: &Path) -> bool {
        let existing: Vec<&PathBuf> = inputs.iter().filter(|p| p.exists()).collect();
        if existing.is_empty() {
            warn!("Nothing to concatenate; all inputs are missing");
            return false;
        }

        // The demuxer resolves relative entries against the list's own directory.
        let listing: String = existing
            .iter()
            .map(|p| {
                let entry = std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
                format!("file '{}'\n", entry.to_string_lossy().replace('\'', r"'\''"))
            })
            .collect();
        if let Err(e) = tokio::fs::write(manifest, listing).await {
            error!(manifest = %manifest.display(), error = %e, "Failed to write concat list");
            return false;
        }

        let manifest_arg = manifest.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let copy_args = [
            "-y", "-f", "concat", "-safe", "0", "-i", &*manifest_arg, "-c", "copy", &*output_arg,
        ];
        let mut ok = matches!(self.run_ffmpeg(&copy_args).await, Ok(out) if out.status.success());

        if !ok {
            warn!("ffmpeg concat with copy failed; retrying with re-encode");
            let encode_args = [
                "-y", "-f", "concat", "-safe", "0", "-i", &*manifest_arg, "-c:a", "pcm_s16le",
                &*output_arg,
            ];
            ok = matches!(self.run_ffmpeg(&encode_args).await, Ok(out) if out.status.success());
        }

        let _ = tokio::fs::remove_file(manifest).await;

        if !ok {
            error!(output = %output.display(), "ffmpeg failed to concatenate wav files");
            let _ = tokio::fs::remove_file(output).await;
            return false;
        }
        match check_wav(output) {
            Ok(secs) => {
                info!(parts = existing.len(), duration_secs = secs, "Concatenated wav files");
                true
            }
            Err(e) => {
                error!(error = %e, "Concatenated wav is unusable");
                let _ = tokio::fs::remove_file(output).await;
                false
            }
        }
    }

    async fn count_audio_streams(&self, path: &Path) -> Result<usize, MediaError> {
        let out = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "a",
                "-show_entries",
                "stream=codec_name",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: self.ffprobe.display().to_string(),
                source,
            })?;

        if !out.status.success() {
            return Err(MediaError::Failed {
                tool: self.ffprobe.display().to_string(),
                status: out.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count())
    }

    async fn max_volume_db(&self, path: &Path, window_secs: u32) -> Result<Option<f64>, MediaError> {
        let window = window_secs.to_string();
        let path_arg = path.to_string_lossy();
        let args = [
            "-t", window.as_str(), "-i", &*path_arg, "-af", "volumedetect", "-vn", "-sn", "-dn", "-f",
            "null", "-",
        ];
        let out = self.run_ffmpeg(&args).await?;
        Ok(parse_max_volume(&String::from_utf8_lossy(&out.stderr)))
    }
}

/// Extracts the `max_volume` reading from ffmpeg's volumedetect report.
pub fn parse_max_volume(report: &str) -> Option<f64> {
    MAX_VOLUME
        .captures(report)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Decides whether a media file carries audible content.
///
/// A clean probe reporting zero audio streams is authoritative. Otherwise the
/// peak loudness over the analysis window is compared with the policy
/// threshold; probe or analysis failures fall back to
/// [`AudioPolicy::assume_audio_on_error`].
pub async fn has_usable_audio(tool: &dyn MediaTool, path: &Path, policy: &AudioPolicy) -> bool {
    match tool.count_audio_streams(path).await {
        Ok(0) => {
            info!(path = %path.display(), "No audio stream in media");
            return false;
        }
        Ok(streams) => debug!(streams, "Audio streams found"),
        Err(e) => {
            warn!(error = %e, "Audio stream probe failed");
            return policy.assume_audio_on_error;
        }
    }

    match tool.max_volume_db(path, policy.analysis_window_secs).await {
        Ok(Some(peak)) => {
            info!(peak_db = peak, "Detected peak volume");
            if peak < policy.silence_threshold_db {
                info!(
                    threshold_db = policy.silence_threshold_db,
                    "Audio is effectively silent"
                );
                return false;
            }
            true
        }
        Ok(None) => {
            warn!("Could not read peak volume; using fallback verdict");
            policy.assume_audio_on_error
        }
        Err(e) => {
            warn!(error = %e, "Volume analysis failed; using fallback verdict");
            policy.assume_audio_on_error
        }
    }
}

/// Reads the header of a wav the transcoder produced and returns its length
/// in seconds. A file hound cannot open or one without frames is rejected.
pub fn check_wav(path: &Path) -> Result<f64, MediaError> {
    let invalid = |reason: String| MediaError::InvalidWav {
        path: path.to_path_buf(),
        reason,
    };
    let reader = WavReader::open(path).map_err(|e| invalid(e.to_string()))?;
    let frames = reader.duration();
    if frames == 0 {
        return Err(invalid("no audio frames".to_string()));
    }
    Ok(f64::from(frames) / f64::from(reader.spec().sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedProbe {
        streams: Result<usize, ()>,
        peak: Result<Option<f64>, ()>,
    }

    fn probe_error() -> MediaError {
        MediaError::Failed {
            tool: "ffprobe".into(),
            status: "exit status: 1".into(),
        }
    }

    #[async_trait]
    impl MediaTool for ScriptedProbe {
        async fn to_normalized_wav(&self, _input: &Path, _output: &Path) -> bool {
            unreachable!()
        }

        async fn concat(&self, _inputs: &[PathBuf], _manifest: &Path, _output: &Path) -> bool {
            unreachable!()
        }

        async fn count_audio_streams(&self, _path: &Path) -> Result<usize, MediaError> {
            self.streams.map_err(|_| probe_error())
        }

        async fn max_volume_db(&self, _path: &Path, window: u32) -> Result<Option<f64>, MediaError> {
            assert_eq!(window, 20);
            self.peak.map_err(|_| probe_error())
        }
    }

    async fn verdict(streams: Result<usize, ()>, peak: Result<Option<f64>, ()>) -> bool {
        let probe = ScriptedProbe { streams, peak };
        has_usable_audio(&probe, Path::new("clip.mp4"), &AudioPolicy::default()).await
    }

    #[tokio::test]
    async fn zero_streams_is_authoritative() {
        assert!(!verdict(Ok(0), Ok(Some(-3.0))).await);
    }

    #[tokio::test]
    async fn quiet_clip_is_rejected() {
        assert!(!verdict(Ok(1), Ok(Some(-61.2))).await);
    }

    #[tokio::test]
    async fn normal_clip_is_accepted() {
        assert!(verdict(Ok(1), Ok(Some(-4.5))).await);
        assert!(verdict(Ok(2), Ok(Some(-50.0))).await);
    }

    #[tokio::test]
    async fn tool_failures_assume_audio() {
        assert!(verdict(Err(()), Ok(None)).await);
        assert!(verdict(Ok(1), Err(())).await);
        assert!(verdict(Ok(1), Ok(None)).await);
    }

    #[tokio::test]
    async fn failure_default_is_configurable() {
        let probe = ScriptedProbe {
            streams: Err(()),
            peak: Ok(None),
        };
        let policy = AudioPolicy {
            assume_audio_on_error: false,
            ..AudioPolicy::default()
        };
        assert!(!has_usable_audio(&probe, Path::new("x"), &policy).await);
    }

    #[test]
    fn parses_volumedetect_report() {
        let report = "[Parsed_volumedetect_0 @ 0x1] n_samples: 88200\n\
                      [Parsed_volumedetect_0 @ 0x1] mean_volume: -27.3 dB\n\
                      [Parsed_volumedetect_0 @ 0x1] max_volume: -12.5 dB\n";
        assert_eq!(parse_max_volume(report), Some(-12.5));
        assert_eq!(parse_max_volume("max_volume: 0.0 dB"), Some(0.0));
        assert_eq!(parse_max_volume("no audio here"), None);
    }

    fn write_wav(path: &Path, frames: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn check_wav_reports_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 4000);
        let secs = check_wav(&path).unwrap();
        assert!((secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn check_wav_rejects_empty_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        write_wav(&empty, 0);
        assert!(matches!(check_wav(&empty), Err(MediaError::InvalidWav { .. })));

        let junk = dir.path().join("junk.wav");
        std::fs::write(&junk, b"not a wav").unwrap();
        assert!(matches!(check_wav(&junk), Err(MediaError::InvalidWav { .. })));

        assert!(check_wav(&dir.path().join("absent.wav")).is_err());
    }
}

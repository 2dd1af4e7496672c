use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

/// Intermediate files a single run may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    IntroMp3,
    IntroWav,
    BodyMp3,
    BodyWav,
    CombinedMp3,
    CombinedWav,
    MediaSource,
    MediaWav,
    FinalUpload,
    TextUpload,
    ConcatList,
}

impl Artifact {
    pub const ALL: [Artifact; 11] = [
        Artifact::IntroMp3,
        Artifact::IntroWav,
        Artifact::BodyMp3,
        Artifact::BodyWav,
        Artifact::CombinedMp3,
        Artifact::CombinedWav,
        Artifact::MediaSource,
        Artifact::MediaWav,
        Artifact::FinalUpload,
        Artifact::TextUpload,
        Artifact::ConcatList,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::IntroMp3 => "intro.mp3",
            Artifact::IntroWav => "intro.wav",
            Artifact::BodyMp3 => "body.mp3",
            Artifact::BodyWav => "body.wav",
            Artifact::CombinedMp3 => "combined.mp3",
            Artifact::CombinedWav => "combined.wav",
            Artifact::MediaSource => "media_source",
            Artifact::MediaWav => "media_raw.wav",
            Artifact::FinalUpload => "final_upload.wav",
            Artifact::TextUpload => "text_upload.wav",
            Artifact::ConcatList => "concat_list.txt",
        }
    }
}

/// Per-run scratch directory, `<root>/run-XXXXXX`.
///
/// Every artifact path is derived from the directory. The directory is removed
/// by [`RunWorkspace::purge`], or when the workspace is dropped.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("run-").tempdir_in(root)?;
        debug!(dir = %dir.path().display(), "Created run workspace");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.path().join(artifact.file_name())
    }

    /// Removes every known artifact and then the directory. Removal errors
    /// are logged, never returned.
    pub fn purge(self) {
        for artifact in Artifact::ALL {
            let path = self.path(artifact);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
            }
        }
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(dir = %dir.display(), error = %e, "Failed to remove run workspace");
        }
    }
}

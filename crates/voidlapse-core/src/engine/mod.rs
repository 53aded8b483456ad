pub mod ffmpeg;

#[cfg(test)]
pub(crate) mod fake;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::video::probe::FrameRate;

/// Failure of a single external tool invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn {program} (is ffmpeg installed?)")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("i/o error while running {program}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Target encoding for reassembled videos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub codec: String,
    pub pixel_format: String,
    pub preset: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            preset: "ultrafast".to_string(),
        }
    }
}

/// Numbered image sequence handed to the encoder.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    /// printf-style path pattern, e.g. `/tmp/x/processed-%08d.png`.
    pub pattern: PathBuf,
    /// Number of the first image in the sequence.
    pub start_number: u32,
}

/// Narrow interface over the decode/probe/encode tool.
///
/// Every call blocks until the tool exits. Implementations must check the exit status and
/// report non-zero exits as errors.
pub trait MediaEngine {
    /// Return the structured probe report (JSON) describing the first video stream.
    fn probe(&self, input: &Path) -> Result<String, EngineError>;

    /// Return one line per decoded frame holding its presentation time in seconds.
    fn frame_offsets(&self, input: &Path) -> Result<String, EngineError>;

    /// Dump every frame of `input` into images named after `pattern`, numbered from 0.
    fn extract_frames(&self, input: &Path, pattern: &Path) -> Result<(), EngineError>;

    /// Encode the numbered images into a single video at `output`, overwriting it.
    fn encode(
        &self,
        frames: &ImageSequence,
        frame_rate: FrameRate,
        settings: &EncodeSettings,
        output: &Path,
    ) -> Result<(), EngineError>;
}

/// Shared flag used to abort a running tool invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

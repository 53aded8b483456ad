use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

/// A single extracted frame and the instant it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Zero-based position of the frame within the video.
    pub index: u32,
    /// Raw frame image as dumped by the decoder.
    pub source_path: PathBuf,
    /// Presentation time relative to stream start, if the decoder reported one.
    pub presentation_offset: Option<Duration>,
    /// Wall-clock instant the frame was captured.
    pub timestamp: DateTime<Utc>,
}

/// A frame after the timestamp overlay has been drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub index: u32,
    pub path: PathBuf,
}

/// Naming scheme for a numbered image sequence: `<prefix><zero-padded index><suffix>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameName {
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub width: usize,
}

/// Raw frames written by the extractor.
pub const EXTRACTED: FrameName = FrameName {
    prefix: "frame-",
    suffix: ".png",
    width: 8,
};

/// Frames with the overlay drawn, read back by the assembler.
pub const PROCESSED: FrameName = FrameName {
    prefix: "processed-",
    suffix: ".png",
    width: 8,
};

impl FrameName {
    pub fn file_name(&self, index: u32) -> String {
        format!("{}{:0width$}{}", self.prefix, index, self.suffix, width = self.width)
    }

    pub fn path_in(&self, dir: &Path, index: u32) -> PathBuf {
        dir.join(self.file_name(index))
    }

    /// printf-style pattern understood by the encoder, e.g. `frame-%08d.png`.
    pub fn pattern_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}%0{}d{}", self.prefix, self.width, self.suffix))
    }

    /// Extract the embedded index from a file name. Padding width is not enforced.
    pub fn parse(&self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(self.prefix)?
            .strip_suffix(self.suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

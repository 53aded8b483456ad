//! In-process stand-in for ffmpeg used by the pipeline tests.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use super::{EncodeSettings, EngineError, ImageSequence, MediaEngine};
use crate::video::probe::FrameRate;

const WIDTH: u32 = 96;
const HEIGHT: u32 = 64;

pub const CREATION_TIME: &str = "2024-06-01T12:00:00.000000Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Video,
    Empty,
    Missing,
}

pub struct FakeEngine {
    frame_count: u32,
    report: String,
    offsets: Option<String>,
    skip: Option<u32>,
    fail_probe: bool,
    fail_offsets: bool,
    fail_extract: bool,
    fail_encode: bool,
    output: OutputMode,
    scratch_seen: RefCell<Option<PathBuf>>,
    encoded: Cell<Option<(FrameRate, usize)>>,
}

impl FakeEngine {
    /// A 25 fps video with `frame_count` frames and a creation time.
    pub fn new(frame_count: u32) -> Self {
        Self {
            frame_count,
            report: report(Some(CREATION_TIME), "25/1"),
            offsets: None,
            skip: None,
            fail_probe: false,
            fail_offsets: false,
            fail_extract: false,
            fail_encode: false,
            output: OutputMode::Video,
            scratch_seen: RefCell::new(None),
            encoded: Cell::new(None),
        }
    }

    pub fn with_report(mut self, report: String) -> Self {
        self.report = report;
        self
    }

    pub fn with_offsets(mut self, offsets: &str) -> Self {
        self.offsets = Some(offsets.to_string());
        self
    }

    pub fn skipping_frame(mut self, index: u32) -> Self {
        self.skip = Some(index);
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub fn failing_offsets(mut self) -> Self {
        self.fail_offsets = true;
        self
    }

    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn writing_empty_output(mut self) -> Self {
        self.output = OutputMode::Empty;
        self
    }

    pub fn writing_no_output(mut self) -> Self {
        self.output = OutputMode::Missing;
        self
    }

    /// Directory the frames were extracted into, if extraction ran.
    pub fn scratch_seen(&self) -> Option<PathBuf> {
        self.scratch_seen.borrow().clone()
    }

    pub fn encoded_rate(&self) -> Option<FrameRate> {
        self.encoded.get().map(|(rate, _)| rate)
    }

    /// Number of consecutive images the encoder found.
    pub fn encoded_frames(&self) -> Option<usize> {
        self.encoded.get().map(|(_, n)| n)
    }
}

/// Build a JSON probe report in ffprobe's shape.
pub fn report(creation_time: Option<&str>, rate: &str) -> String {
    let tags = creation_time
        .map(|t| format!(r#", "tags": {{ "creation_time": "{t}" }}"#))
        .unwrap_or_default();
    format!(
        r#"{{ "streams": [{{ "codec_name": "h264", "pix_fmt": "yuv420p", "r_frame_rate": "{rate}"{tags} }}] }}"#
    )
}

fn expand(pattern: &Path, index: u32) -> PathBuf {
    PathBuf::from(
        pattern
            .to_string_lossy()
            .replace("%08d", &format!("{index:08}"))
            .replace("%05d", &format!("{index:05}")),
    )
}

fn failure(program: &str) -> EngineError {
    EngineError::Io {
        program: program.to_string(),
        source: std::io::Error::other("simulated failure"),
    }
}

impl MediaEngine for FakeEngine {
    fn probe(&self, _input: &Path) -> Result<String, EngineError> {
        if self.fail_probe {
            return Err(failure("ffprobe"));
        }
        Ok(self.report.clone())
    }

    fn frame_offsets(&self, _input: &Path) -> Result<String, EngineError> {
        if self.fail_offsets {
            return Err(failure("ffprobe"));
        }
        if let Some(offsets) = &self.offsets {
            return Ok(offsets.clone());
        }
        Ok((0..self.frame_count)
            .map(|i| format!("{:.6}\n", i as f64 / 25.0))
            .collect())
    }

    fn extract_frames(&self, _input: &Path, pattern: &Path) -> Result<(), EngineError> {
        *self.scratch_seen.borrow_mut() = pattern.parent().map(Path::to_path_buf);
        if self.fail_extract {
            return Err(failure("ffmpeg"));
        }
        for i in 0..self.frame_count {
            if self.skip == Some(i) {
                continue;
            }
            let shade = (i * 7 % 200) as u8 + 20;
            RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([shade, shade, shade]))
                .save(expand(pattern, i))
                .map_err(|e| EngineError::Io {
                    program: "ffmpeg".to_string(),
                    source: std::io::Error::other(e),
                })?;
        }
        Ok(())
    }

    fn encode(
        &self,
        frames: &ImageSequence,
        frame_rate: FrameRate,
        _settings: &EncodeSettings,
        output: &Path,
    ) -> Result<(), EngineError> {
        if self.fail_encode {
            return Err(failure("ffmpeg"));
        }
        let count = (frames.start_number..)
            .take_while(|i| expand(&frames.pattern, *i).exists())
            .count();
        self.encoded.set(Some((frame_rate, count)));

        let io = |source: std::io::Error| EngineError::Io {
            program: "ffmpeg".to_string(),
            source,
        };
        match self.output {
            OutputMode::Video => {
                let body = format!("fake video: {count} frames @ {frame_rate}");
                std::fs::write(output, body).map_err(io)
            }
            OutputMode::Empty => std::fs::write(output, b"").map_err(io),
            OutputMode::Missing => Ok(()),
        }
    }
}

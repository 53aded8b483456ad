use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::MediaEngine;

const DEFAULT_CODEC: &str = "h264";
const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// A frame rate kept as the exact rational reported by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const FALLBACK: FrameRate = FrameRate { num: 30, den: 1 };

    /// Parse `num/den` (or a bare integer). Returns None for a zero or missing denominator,
    /// a zero numerator, or anything unparsable.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num.trim().parse().ok()?, den.trim().parse().ok()?),
            None => (s.parse().ok()?, 1),
        };
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Stream parameters of the input video. Each field has its own fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub frame_rate: FrameRate,
    pub codec: String,
    pub pixel_format: String,
    /// Container or stream `creation_time`; None when absent or unparsable.
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Probe `input` through the engine and derive its [`VideoMetadata`].
///
/// An unreadable input or a failed probe is fatal; missing fields are not.
pub fn probe_video(engine: &dyn MediaEngine, input: &Path) -> Result<VideoMetadata> {
    let file = std::fs::metadata(input)
        .with_context(|| format!("cannot read input video {}", input.display()))?;
    anyhow::ensure!(file.is_file(), "input is not a file: {}", input.display());

    let report = engine.probe(input).context("probe report unavailable")?;
    let meta = parse_probe_report(&report)?;

    info!(
        fps = meta.frame_rate.as_f64(),
        frame_rate = %meta.frame_rate,
        codec = %meta.codec,
        pixel_format = %meta.pixel_format,
        creation_time = ?meta.creation_time,
        "probe completed"
    );
    Ok(meta)
}

/// Turn a JSON probe report into [`VideoMetadata`], applying per-field fallbacks.
pub fn parse_probe_report(report: &str) -> Result<VideoMetadata> {
    let report: ProbeReport =
        serde_json::from_str(report).context("probe report is not valid JSON")?;

    let stream = report.streams.into_iter().next().unwrap_or_else(|| {
        warn!("probe report lists no video stream, using defaults");
        ProbeStream::default()
    });

    let frame_rate = match stream.r_frame_rate.as_deref().and_then(FrameRate::parse) {
        Some(rate) => rate,
        None => {
            warn!(
                raw = ?stream.r_frame_rate,
                fallback = %FrameRate::FALLBACK,
                "unusable r_frame_rate"
            );
            FrameRate::FALLBACK
        }
    };

    let codec = stream
        .codec_name
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CODEC.to_string());
    let pixel_format = stream
        .pix_fmt
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string());

    let format_tags = report.format.map(|f| f.tags).unwrap_or_default();
    let raw_creation = stream
        .tags
        .get("creation_time")
        .or_else(|| format_tags.get("creation_time"));
    let creation_time = raw_creation.and_then(|raw| {
        let parsed = parse_creation_time(raw);
        if parsed.is_none() {
            warn!(%raw, "unparsable creation_time, treating as absent");
        }
        parsed
    });

    Ok(VideoMetadata {
        frame_rate,
        codec,
        pixel_format,
        creation_time,
    })
}

/// Parse an ISO-8601-like timestamp. Values without an offset are taken as UTC.
pub fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

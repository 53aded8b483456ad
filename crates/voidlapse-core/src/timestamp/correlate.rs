use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::engine::MediaEngine;
use crate::fallback::Fallback;
use crate::sequence::SequencedFile;
use crate::video::frame::FrameRecord;
use crate::video::probe::{FrameRate, VideoMetadata};

/// Where the capture start instant came from, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginSource {
    CreationTime,
    FileModified,
    RunStart,
}

impl fmt::Display for OriginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreationTime => write!(f, "creation_time"),
            Self::FileModified => write!(f, "file modification time"),
            Self::RunStart => write!(f, "run start (degraded accuracy)"),
        }
    }
}

/// Instant at which frame 0 was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOrigin {
    pub instant: DateTime<Utc>,
    pub source: OriginSource,
}

/// Pick the capture start: container creation time, then the file's mtime, then `run_start`.
pub fn resolve_origin(
    meta: &VideoMetadata,
    input: &Path,
    run_start: DateTime<Utc>,
) -> CaptureOrigin {
    let resolved = Fallback::new("capture origin")
        .then("creation_time", || {
            let t = meta
                .creation_time
                .ok_or_else(|| anyhow!("probe report has no creation_time"))?;
            Ok((t, OriginSource::CreationTime))
        })
        .then("mtime", || {
            let modified = std::fs::metadata(input)
                .and_then(|m| m.modified())
                .with_context(|| format!("no modification time for {}", input.display()))?;
            Ok((DateTime::<Utc>::from(modified), OriginSource::FileModified))
        })
        .then("run start", || Ok((run_start, OriginSource::RunStart)))
        .resolve();

    let (instant, source) = resolved
        .map(|r| r.value)
        .unwrap_or((run_start, OriginSource::RunStart));

    if source != OriginSource::CreationTime {
        warn!(%source, %instant, "creation_time unavailable, frame timestamps are approximate");
    } else {
        info!(%instant, "using container creation_time as capture origin");
    }
    CaptureOrigin { instant, source }
}

/// Parse `pts_time` lines (one per frame). `N/A` and garbage become unknown offsets.
pub fn parse_frame_offsets(report: &str) -> Vec<Option<Duration>> {
    report
        .lines()
        .map(|line| line.trim().trim_end_matches(','))
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite())
                .map(|secs| Duration::microseconds((secs * 1_000_000.0).round() as i64))
        })
        .collect()
}

/// Ask the engine for per-frame presentation offsets. These are optional, so a failed query
/// only degrades timing to ordinal/frame-rate.
pub fn query_frame_offsets(
    engine: &dyn MediaEngine,
    input: &Path,
) -> Option<Vec<Option<Duration>>> {
    match engine.frame_offsets(input) {
        Ok(report) => {
            let offsets = parse_frame_offsets(&report);
            let known = offsets.iter().filter(|o| o.is_some()).count();
            debug!(frames = offsets.len(), known, "parsed presentation offsets");
            Some(offsets)
        }
        Err(e) => {
            warn!(error = %e, "presentation offsets unavailable, using frame rate timing");
            None
        }
    }
}

/// Offset of frame `index` assuming a constant `frame_rate`, or None if it does not fit in a
/// [`Duration`].
pub fn ordinal_offset(index: u32, frame_rate: FrameRate) -> Option<Duration> {
    let nanos = i128::from(index)
        .checked_mul(i128::from(frame_rate.den))?
        .checked_mul(1_000_000_000)?
        .checked_div(i128::from(frame_rate.num))?;
    i64::try_from(nanos).ok().map(Duration::nanoseconds)
}

/// Assign a capture instant to every frame in `files` (sorted, contiguous from 0).
///
/// A known presentation offset wins over `index / frame_rate`. If the offsets list does not
/// have exactly one entry per frame it is discarded as a whole. The result never goes
/// backwards in time as the index increases.
pub fn correlate(
    origin: CaptureOrigin,
    frame_rate: FrameRate,
    files: &[SequencedFile],
    offsets: Option<&[Option<Duration>]>,
) -> Vec<FrameRecord> {
    let offsets = match offsets {
        Some(offsets) if offsets.len() == files.len() => Some(offsets),
        Some(offsets) => {
            warn!(
                offsets = offsets.len(),
                frames = files.len(),
                "presentation offset count does not match extracted frames, using frame rate timing"
            );
            None
        }
        None => None,
    };

    let mut records: Vec<FrameRecord> = Vec::with_capacity(files.len());
    let mut clamped = 0usize;

    for (pos, file) in files.iter().enumerate() {
        let mut presentation_offset = offsets.and_then(|o| o[pos]);
        let from_pts = presentation_offset.and_then(|o| origin.instant.checked_add_signed(o));
        if from_pts.is_none() && presentation_offset.is_some() {
            warn!(
                index = file.index,
                offset = ?presentation_offset,
                "presentation offset out of range, ignoring"
            );
            presentation_offset = None;
        }
        let from_rate = || {
            ordinal_offset(file.index, frame_rate)
                .and_then(|o| origin.instant.checked_add_signed(o))
        };
        let mut timestamp = match from_pts.or_else(from_rate) {
            Some(t) => t,
            None => {
                warn!(
                    index = file.index,
                    %frame_rate,
                    "frame time out of range, reusing previous timestamp"
                );
                records.last().map_or(origin.instant, |prev| prev.timestamp)
            }
        };

        if let Some(prev) = records.last() {
            if timestamp < prev.timestamp {
                debug!(
                    index = file.index,
                    ?presentation_offset,
                    "timestamp went backwards, clamping"
                );
                timestamp = prev.timestamp;
                clamped += 1;
            }
        }

        records.push(FrameRecord {
            index: file.index,
            source_path: file.path.clone(),
            presentation_offset,
            timestamp,
        });
    }

    if clamped > 0 {
        warn!(clamped, "some frame timestamps were clamped to keep time moving forward");
    }
    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        info!(
            frame_count = records.len(),
            first = %first.timestamp,
            last = %last.timestamp,
            "frames correlated"
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::TimeZone;
    use tracing_test::traced_test;

    use crate::timestamp::format::{DisplayZone, TimestampFormat};

    fn origin() -> CaptureOrigin {
        CaptureOrigin {
            instant: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            source: OriginSource::CreationTime,
        }
    }

    fn files(n: u32) -> Vec<SequencedFile> {
        (0..n)
            .map(|index| SequencedFile {
                index,
                path: PathBuf::from(format!("frame-{index:08}.png")),
            })
            .collect()
    }

    fn metadata(creation_time: Option<DateTime<Utc>>) -> VideoMetadata {
        VideoMetadata {
            frame_rate: FrameRate { num: 25, den: 1 },
            codec: "h264".into(),
            pixel_format: "yuv420p".into(),
            creation_time,
        }
    }

    fn assert_non_decreasing(records: &[FrameRecord]) {
        for pair in records.windows(2) {
            assert!(
                pair[0].timestamp <= pair[1].timestamp,
                "frame {} at {} is after frame {} at {}",
                pair[0].index,
                pair[0].timestamp,
                pair[1].index,
                pair[1].timestamp
            );
        }
    }

    #[test]
    fn ordinal_timing_at_25_fps() {
        let rate = FrameRate { num: 25, den: 1 };
        let records = correlate(origin(), rate, &files(100), None);
        assert_eq!(records.len(), 100);
        for r in &records {
            let expected = origin().instant + Duration::milliseconds(r.index as i64 * 40);
            assert_eq!(r.timestamp, expected);
            assert_eq!(
                TimestampFormat::DateTime.render(r.timestamp, DisplayZone::Utc),
                TimestampFormat::DateTime.render(expected, DisplayZone::Utc)
            );
        }
        assert_eq!(
            TimestampFormat::Time.render(records[75].timestamp, DisplayZone::Utc),
            "12:00:03"
        );
    }

    #[test]
    fn ordinal_offset_is_exact_for_ntsc_rates() {
        let rate = FrameRate { num: 30000, den: 1001 };
        assert_eq!(ordinal_offset(30000, rate), Some(Duration::seconds(1001)));
        assert_eq!(ordinal_offset(0, rate), Some(Duration::zero()));
    }

    #[test]
    fn ordinal_offset_beyond_duration_range_is_none() {
        let rate = FrameRate { num: 1, den: 1001 };
        assert_eq!(ordinal_offset(u32::MAX, rate), None);
        assert_eq!(ordinal_offset(u32::MAX, FrameRate { num: 1, den: u32::MAX }), None);
    }

    #[test]
    #[traced_test]
    fn out_of_range_offset_falls_back_to_frame_rate() {
        let rate = FrameRate { num: 25, den: 1 };
        let offsets = parse_frame_offsets("0.000000\n9223372036854.775807\n0.080000\n");
        let records = correlate(origin(), rate, &files(3), Some(&offsets));
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].presentation_offset, None);
        assert_eq!(records[1].timestamp, origin().instant + Duration::milliseconds(40));
        assert_eq!(records[2].timestamp, origin().instant + Duration::milliseconds(80));
        assert_non_decreasing(&records);
        assert!(logs_contain("presentation offset out of range"));
    }

    #[test]
    fn unrepresentable_frame_time_reuses_previous_timestamp() {
        let slow = FrameRate { num: 1, den: u32::MAX };
        // frame 3 is more nanoseconds away than an i64 holds
        let records = correlate(origin(), slow, &files(4), None);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].timestamp, origin().instant);
        assert!(records[2].timestamp > records[1].timestamp);
        assert_eq!(records[3].timestamp, records[2].timestamp);
    }

    #[test]
    fn presentation_offsets_are_preferred() {
        let rate = FrameRate { num: 25, den: 1 };
        let offsets = vec![
            Some(Duration::zero()),
            Some(Duration::seconds(2)),
            None,
            Some(Duration::seconds(10)),
        ];
        let records = correlate(origin(), rate, &files(4), Some(&offsets));
        assert_eq!(records[1].timestamp, origin().instant + Duration::seconds(2));
        assert_eq!(records[3].timestamp, origin().instant + Duration::seconds(10));
        assert_eq!(records[1].presentation_offset, Some(Duration::seconds(2)));
    }

    #[test]
    #[traced_test]
    fn count_mismatch_falls_back_to_frame_rate_for_all_frames() {
        let rate = FrameRate { num: 25, den: 1 };
        let offsets = vec![Some(Duration::seconds(100)); 3];
        let records = correlate(origin(), rate, &files(5), Some(&offsets));
        assert_eq!(records.len(), 5);
        for r in &records {
            assert_eq!(r.presentation_offset, None);
            assert_eq!(r.timestamp, origin().instant + ordinal_offset(r.index, rate).unwrap());
        }
        assert!(logs_contain("does not match extracted frames"));
    }

    #[test]
    fn monotonic_offsets_give_non_decreasing_timestamps() {
        let rate = FrameRate { num: 30, den: 1 };
        // variable frame spacing, including repeated values
        let steps_ms = [0, 33, 33, 80, 80, 81, 200, 1000, 1000, 1500];
        let mut acc = 0;
        let offsets: Vec<_> = steps_ms
            .iter()
            .map(|ms| {
                acc += ms;
                Some(Duration::milliseconds(acc))
            })
            .collect();
        let records = correlate(origin(), rate, &files(offsets.len() as u32), Some(&offsets));
        assert_non_decreasing(&records);
    }

    #[test]
    fn mixed_known_and_unknown_offsets_never_go_backwards() {
        let rate = FrameRate { num: 1, den: 1 };
        let offsets = vec![
            Some(Duration::seconds(0)),
            Some(Duration::seconds(5)),
            None, // ordinal fallback would be 2s
            Some(Duration::seconds(6)),
        ];
        let records = correlate(origin(), rate, &files(4), Some(&offsets));
        assert_non_decreasing(&records);
        assert_eq!(records[2].timestamp, records[1].timestamp);
    }

    #[test]
    fn parse_offsets_handles_na_and_trailing_commas() {
        let report = "0.000000\n0.040000,\nN/A\n\n0.120000\n";
        let offsets = parse_frame_offsets(report);
        assert_eq!(
            offsets,
            vec![
                Some(Duration::zero()),
                Some(Duration::milliseconds(40)),
                None,
                Some(Duration::milliseconds(120)),
            ]
        );
    }

    #[test]
    fn failed_offset_query_yields_none() {
        let engine = crate::engine::fake::FakeEngine::new(3).failing_offsets();
        assert!(query_frame_offsets(&engine, Path::new("in.mp4")).is_none());
    }

    #[test]
    fn origin_prefers_creation_time() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let o = resolve_origin(&metadata(Some(t)), Path::new("/no/such/file"), Utc::now());
        assert_eq!(o, CaptureOrigin { instant: t, source: OriginSource::CreationTime });
    }

    #[test]
    #[traced_test]
    fn origin_falls_back_to_mtime() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mtime: DateTime<Utc> =
            std::fs::metadata(file.path()).unwrap().modified().unwrap().into();
        let o = resolve_origin(&metadata(None), file.path(), Utc::now() + Duration::days(1));
        assert_eq!(o.source, OriginSource::FileModified);
        assert_eq!(o.instant, mtime);
        assert!(logs_contain("frame timestamps are approximate"));
    }

    #[test]
    fn origin_falls_back_to_run_start() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let o = resolve_origin(&metadata(None), Path::new("/no/such/file"), start);
        assert_eq!(o, CaptureOrigin { instant: start, source: OriginSource::RunStart });
    }
}

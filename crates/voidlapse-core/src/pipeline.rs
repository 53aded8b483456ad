use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::assemble::assemble_video;
use crate::engine::{CancelToken, EncodeSettings, ImageSequence, MediaEngine};
use crate::error::{PipelineError, Stage};
use crate::render::{FrameRenderer, OverlayFont, TextColor};
use crate::scratch::ScratchDir;
use crate::sequence::{self, SequencedFile};
use crate::timestamp::correlate::{self, CaptureOrigin};
use crate::timestamp::format::{DisplayZone, TimestampFormat};
use crate::video::extract::extract_frames;
use crate::video::frame::{FrameRecord, RenderedFrame, PROCESSED};
use crate::video::probe::{self, FrameRate};

/// Log rendering progress every this many frames.
const PROGRESS_INTERVAL: usize = 30;

/// Parameters for the timestamp pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub color: TextColor,
    pub format: TimestampFormat,
    pub zone: DisplayZone,
    /// Scalable font tried before the platform defaults.
    pub font_path: Option<PathBuf>,
    /// Parent directory for the run's scratch directory, or None for the system temp dir.
    pub scratch_root: Option<PathBuf>,
    pub encode: EncodeSettings,
    /// Checked between frames while rendering.
    pub cancel: CancelToken,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            color: TextColor::White,
            format: TimestampFormat::DateTime,
            zone: DisplayZone::Local,
            font_path: None,
            scratch_root: None,
            encode: EncodeSettings::default(),
            cancel: CancelToken::new(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frame_count: usize,
    pub frame_rate: FrameRate,
    pub origin: CaptureOrigin,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub output_bytes: u64,
}

/// Overlay every frame of `input` with its capture time and write the result to `output`.
///
/// All intermediate frames live in a scratch directory that is removed before this returns,
/// whether the run succeeded or not.
pub fn run_pipeline(
    engine: &dyn MediaEngine,
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    let run_start = Utc::now();
    info!(?input, ?output, color = %config.color, format = %config.format, "pipeline starting");

    let scratch =
        ScratchDir::create(config.scratch_root.as_deref()).map_err(PipelineError::ScratchIo)?;

    let result = run_stages(engine, input, output, config, scratch.path(), run_start);
    let cleanup = scratch.close();

    match (result, cleanup) {
        (Ok(summary), Ok(())) => {
            info!(
                frame_count = summary.frame_count,
                output_bytes = summary.output_bytes,
                stage = %Stage::Done,
                "pipeline complete"
            );
            Ok(summary)
        }
        (Ok(_), Err(e)) => Err(PipelineError::ScratchIo(e)),
        (Err(e), cleanup) => {
            if let Err(cleanup_err) = cleanup {
                warn!(
                    error = %format!("{cleanup_err:#}"),
                    "scratch cleanup failed after pipeline error"
                );
            }
            warn!(reached = %e.stage(), error = %e, "pipeline failed");
            Err(e)
        }
    }
}

fn run_stages(
    engine: &dyn MediaEngine,
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    scratch: &Path,
    run_start: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let meta = probe::probe_video(engine, input).map_err(PipelineError::Probe)?;
    log_stage(Stage::Probed);

    let extracted = extract_frames(engine, input, scratch).map_err(PipelineError::Extraction)?;
    log_stage(Stage::Extracted);

    let offsets = correlate::query_frame_offsets(engine, input);
    let origin = correlate::resolve_origin(&meta, input, run_start);
    let records = correlate::correlate(origin, meta.frame_rate, &extracted, offsets.as_deref());
    log_stage(Stage::Correlated);

    let renderer = FrameRenderer::new(OverlayFont::load(config.font_path.as_deref()), config.color);
    let rendered = render_frames(&renderer, &records, scratch, config)?;
    log_stage(Stage::Rendered);

    let processed = sequence::sequence_contiguous(scratch, PROCESSED)
        .map_err(|e| PipelineError::Sequencing(e.into()))?;
    check_rendered(&rendered, &processed).map_err(PipelineError::Sequencing)?;
    log_stage(Stage::Sequenced);

    let frames = ImageSequence {
        pattern: PROCESSED.pattern_in(scratch),
        start_number: 0,
    };
    let output_bytes = assemble_video(
        engine,
        &frames,
        processed.len(),
        meta.frame_rate,
        &config.encode,
        output,
    )
    .map_err(PipelineError::Assembly)?;
    log_stage(Stage::Assembled);

    // correlate() returns one record per extracted frame, and extraction guarantees at least one
    let (first_timestamp, last_timestamp) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => (origin.instant, origin.instant),
    };

    Ok(RunSummary {
        frame_count: processed.len(),
        frame_rate: meta.frame_rate,
        origin,
        first_timestamp,
        last_timestamp,
        output_bytes,
    })
}

fn log_stage(stage: Stage) {
    info!(%stage, "stage complete");
}

fn render_frames(
    renderer: &FrameRenderer,
    records: &[FrameRecord],
    scratch: &Path,
    config: &PipelineConfig,
) -> Result<Vec<RenderedFrame>, PipelineError> {
    let mut rendered = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let render_err = |source: anyhow::Error| PipelineError::Render {
            index: record.index,
            path: record.source_path.clone(),
            source,
        };
        if config.cancel.is_cancelled() {
            return Err(render_err(anyhow!("cancelled")));
        }

        let text = config.format.render(record.timestamp, config.zone);
        let path = PROCESSED.path_in(scratch, record.index);
        renderer
            .render_file(&record.source_path, &path, &text)
            .map_err(render_err)?;

        // the raw frame is not read again
        if let Err(e) = std::fs::remove_file(&record.source_path) {
            debug!(path = ?record.source_path, error = %e, "could not remove raw frame");
        }

        if i % PROGRESS_INTERVAL == 0 {
            info!(frame = i, total = records.len(), %text, "rendering frames");
        }
        rendered.push(RenderedFrame {
            index: record.index,
            path,
        });
    }

    Ok(rendered)
}

/// The processed frames on disk must be exactly the frames we rendered.
fn check_rendered(rendered: &[RenderedFrame], processed: &[SequencedFile]) -> anyhow::Result<()> {
    anyhow::ensure!(
        rendered.len() == processed.len(),
        "rendered {} frames but found {} processed frames",
        rendered.len(),
        processed.len()
    );
    for (r, p) in rendered.iter().zip(processed) {
        anyhow::ensure!(
            r.index == p.index && r.path == p.path,
            "processed frame {} does not match rendered frame {}",
            p.index,
            r.index
        );
    }
    Ok(())
}

//! Build a timelapse video from a directory of captured stills.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::assemble::assemble_video;
use crate::engine::{EncodeSettings, ImageSequence, MediaEngine};
use crate::pipeline::{run_pipeline, PipelineConfig, RunSummary};
use crate::scratch::ScratchDir;
use crate::sequence::{self, SequencedFile};
use crate::video::frame::FrameName;
use crate::video::probe::FrameRate;

/// Stills written by the capture loop.
pub const CAPTURED: FrameName = FrameName {
    prefix: "image_",
    suffix: ".jpg",
    width: 5,
};

/// Stills renumbered from 0 inside the scratch directory.
const STAGED: FrameName = FrameName {
    prefix: "still-",
    suffix: ".jpg",
    width: 8,
};

pub const TIMELAPSE_FRAME_RATE: FrameRate = FrameRate { num: 30, den: 1 };

#[derive(Debug, Clone, Default)]
pub struct TimelapseOptions {
    /// Also produce a timestamped copy using these settings.
    pub timestamp: Option<PipelineConfig>,
    pub scratch_root: Option<PathBuf>,
    pub encode: EncodeSettings,
}

#[derive(Debug, Clone)]
pub struct TimelapseOutput {
    pub video: PathBuf,
    pub image_count: usize,
    pub timestamped: Option<(PathBuf, RunSummary)>,
}

pub fn timelapse_file_name(now: DateTime<Local>) -> String {
    format!("timelapse_{}.mp4", now.format("%d-%m-%Y-%H%M"))
}

/// Encode every `image_NNNNN.jpg` in `input_dir`, in numeric order, into a 30 fps video in
/// `output_dir`. Gaps in the numbering are allowed.
pub fn build_timelapse(
    engine: &dyn MediaEngine,
    input_dir: &Path,
    output_dir: &Path,
    options: &TimelapseOptions,
) -> Result<TimelapseOutput> {
    ensure!(
        input_dir.is_dir(),
        "input directory not found: {}",
        input_dir.display()
    );
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let stills = sequence::sequence_dir(input_dir, CAPTURED).context("no stills to build from")?;
    let video = output_dir.join(timelapse_file_name(Local::now()));
    info!(?input_dir, ?video, image_count = stills.len(), "building timelapse");

    let scratch = ScratchDir::create(options.scratch_root.as_deref())?;
    let encoded = stage_stills(&stills, scratch.path()).and_then(|()| {
        let frames = ImageSequence {
            pattern: STAGED.pattern_in(scratch.path()),
            start_number: 0,
        };
        assemble_video(
            engine,
            &frames,
            stills.len(),
            TIMELAPSE_FRAME_RATE,
            &options.encode,
            &video,
        )
    });
    let cleanup = scratch.close();
    encoded.context("timelapse encoding failed")?;
    cleanup?;

    let timestamped = match &options.timestamp {
        Some(config) => {
            let file_name = video
                .file_name()
                .map(|n| format!("ts_{}", n.to_string_lossy()))
                .context("timelapse output has no file name")?;
            let ts_video = output_dir.join(file_name);
            let summary = run_pipeline(engine, &video, &ts_video, config)
                .context("timestamping the timelapse failed")?;
            Some((ts_video, summary))
        }
        None => None,
    };

    Ok(TimelapseOutput {
        video,
        image_count: stills.len(),
        timestamped,
    })
}

/// Link (or copy) the stills into `scratch` as a gap-free sequence starting at 0.
fn stage_stills(stills: &[SequencedFile], scratch: &Path) -> Result<()> {
    for (i, still) in stills.iter().enumerate() {
        let dest = STAGED.path_in(scratch, i as u32);
        if std::fs::hard_link(&still.path, &dest).is_err() {
            std::fs::copy(&still.path, &dest).with_context(|| {
                format!("failed to stage {} as {}", still.path.display(), dest.display())
            })?;
        }
    }
    debug!(count = stills.len(), ?scratch, "stills staged");
    Ok(())
}

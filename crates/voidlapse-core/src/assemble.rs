use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info};

use crate::engine::{EncodeSettings, ImageSequence, MediaEngine};
use crate::video::probe::FrameRate;

/// Encode a numbered image sequence into `output` and check that something was written.
///
/// Returns the size of the output file in bytes.
pub fn assemble_video(
    engine: &dyn MediaEngine,
    frames: &ImageSequence,
    frame_count: usize,
    frame_rate: FrameRate,
    settings: &EncodeSettings,
    output: &Path,
) -> Result<u64> {
    if frame_count == 0 {
        bail!("no frames to assemble");
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    // a leftover file must not pass for a fresh encode
    match std::fs::remove_file(output) {
        Ok(()) => debug!(?output, "removed existing output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to remove existing output {}", output.display()))
        }
    }

    engine
        .encode(frames, frame_rate, settings, output)
        .context("encode engine failed")?;

    // the encoder can exit 0 without writing anything useful
    let bytes = match std::fs::metadata(output) {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!(?output, error = %e, "encoder reported success but output is missing");
            return Err(e)
                .with_context(|| format!("output video {} was not created", output.display()));
        }
    };
    if bytes == 0 {
        error!(?output, "encoder reported success but output is empty");
        bail!("output video {} is empty", output.display());
    }

    info!(?output, frame_count, %frame_rate, bytes, "video assembled");
    Ok(bytes)
}

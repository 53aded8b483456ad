use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::engine::MediaEngine;
use crate::sequence::{self, SequenceError, SequencedFile};
use crate::video::frame::EXTRACTED;

/// Dump every frame of `input` into `scratch` and return them in index order.
///
/// The frames must come out numbered 0..N with nothing missing; zero frames means the input
/// could not be decoded.
pub fn extract_frames(
    engine: &dyn MediaEngine,
    input: &Path,
    scratch: &Path,
) -> Result<Vec<SequencedFile>> {
    let pattern = EXTRACTED.pattern_in(scratch);
    engine
        .extract_frames(input, &pattern)
        .context("decode engine failed")?;

    let frames = match sequence::sequence_contiguous(scratch, EXTRACTED) {
        Ok(frames) => frames,
        Err(e @ SequenceError::Empty { .. }) => {
            return Err(e).context("decoder produced zero frames; input is corrupt or undecodable")
        }
        Err(e) => return Err(e).context("extracted frame numbering is inconsistent"),
    };

    info!(frame_count = frames.len(), ?scratch, "frames extracted");
    Ok(frames)
}

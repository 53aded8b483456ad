//! Numeric ordering of numbered frame files.
//!
//! Directory listings come back in whatever order the platform likes, and plain string order
//! puts `frame-10` before `frame-2` once padding runs out. Every file name is therefore parsed
//! into a typed index and sorted on that.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::video::frame::FrameName;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("no frames named {prefix}N{suffix} found in {}", dir.display())]
    Empty {
        dir: PathBuf,
        prefix: &'static str,
        suffix: &'static str,
    },

    #[error("frame sequence has a gap: expected index {expected}, found {found}")]
    Gap { expected: u32, found: u32 },

    #[error("frame index {0} appears more than once")]
    Duplicate(u32),

    #[error("failed to list {}", dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file whose name carried a parseable index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedFile {
    pub index: u32,
    pub path: PathBuf,
}

/// List `dir`, keep the files matching `naming`, and sort them by embedded index.
///
/// Names that do not parse are logged and skipped. An empty result is an error.
pub fn sequence_dir(dir: &Path, naming: FrameName) -> Result<Vec<SequencedFile>, SequenceError> {
    let io_err = |source: std::io::Error| SequenceError::Io {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut skipped = 0usize;
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(naming.prefix) {
            continue;
        }
        match naming.parse(&name) {
            Some(index) => files.push(SequencedFile {
                index,
                path: entry.path(),
            }),
            None => {
                warn!(file = %name, "cannot parse frame index from file name, skipping");
                skipped += 1;
            }
        }
    }

    if files.is_empty() {
        return Err(SequenceError::Empty {
            dir: dir.to_path_buf(),
            prefix: naming.prefix,
            suffix: naming.suffix,
        });
    }

    files.sort_by_key(|f| f.index);
    debug!(
        count = files.len(),
        skipped,
        first = files[0].index,
        last = files[files.len() - 1].index,
        "sequenced frame files"
    );
    Ok(files)
}

/// Check that sorted indices run 0, 1, 2, ... with nothing missing or repeated.
pub fn ensure_contiguous(files: &[SequencedFile]) -> Result<(), SequenceError> {
    for (expected, file) in files.iter().enumerate() {
        let expected = expected as u32;
        if file.index == expected {
            continue;
        }
        if file.index < expected {
            return Err(SequenceError::Duplicate(file.index));
        }
        return Err(SequenceError::Gap {
            expected,
            found: file.index,
        });
    }
    info!(frame_count = files.len(), "frame sequence is contiguous");
    Ok(())
}

/// [`sequence_dir`] followed by [`ensure_contiguous`].
pub fn sequence_contiguous(
    dir: &Path,
    naming: FrameName,
) -> Result<Vec<SequencedFile>, SequenceError> {
    let files = sequence_dir(dir, naming)?;
    ensure_contiguous(&files)?;
    Ok(files)
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info};

const SCRATCH_PREFIX: &str = "voidlapse-frames-";

/// Run-scoped directory for intermediate frames.
///
/// Removed on [`ScratchDir::close`], and on drop for any path that never reaches it
/// (early return, panic unwinding).
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh, uniquely named directory under `root` (or the system temp dir).
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("failed to create scratch root {}", root.display()))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("failed to create scratch directory")?;

        info!(path = ?dir.path(), "scratch directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the directory and everything in it, reporting any failure.
    pub fn close(self) -> Result<()> {
        let path: PathBuf = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("failed to remove scratch directory {}", path.display()))?;
        debug!(?path, "scratch directory removed");
        Ok(())
    }
}

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline progress. Each stage completes fully before the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Probed,
    Extracted,
    Correlated,
    Rendered,
    Sequenced,
    Assembled,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Probed => "probed",
            Stage::Extracted => "extracted",
            Stage::Correlated => "correlated",
            Stage::Rendered => "rendered",
            Stage::Sequenced => "sequenced",
            Stage::Assembled => "assembled",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Fatal pipeline failure. The source chain carries the underlying cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input unreadable or probe engine failed.
    #[error("probe failed")]
    Probe(#[source] anyhow::Error),

    /// Decode engine failed, produced no frames, or the frame indices are not contiguous.
    #[error("frame extraction failed")]
    Extraction(#[source] anyhow::Error),

    #[error("rendering frame {index} ({}) failed", path.display())]
    Render {
        index: u32,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// No usable processed frames to assemble.
    #[error("sequencing processed frames failed")]
    Sequencing(#[source] anyhow::Error),

    /// Encode engine failed or the output is missing/empty.
    #[error("video assembly failed")]
    Assembly(#[source] anyhow::Error),

    #[error("scratch storage failure")]
    ScratchIo(#[source] anyhow::Error),
}

impl PipelineError {
    /// The last stage reached before this failure.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Probe(_) | PipelineError::ScratchIo(_) => Stage::Start,
            PipelineError::Extraction(_) => Stage::Probed,
            PipelineError::Render { .. } => Stage::Correlated,
            PipelineError::Sequencing(_) => Stage::Rendered,
            PipelineError::Assembly(_) => Stage::Sequenced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_chain_names_stage_and_cause() {
        let err = PipelineError::Assembly(anyhow::anyhow!("output missing"));
        let rendered = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(rendered, "video assembly failed: output missing");
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Start < Stage::Probed);
        assert!(Stage::Assembled < Stage::Done);
        assert_eq!(PipelineError::Extraction(anyhow::anyhow!("x")).stage(), Stage::Probed);
    }
}

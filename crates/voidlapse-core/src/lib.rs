//! Frame-accurate wall-clock timestamp overlays for video files.
//!
//! The pipeline probes the input, dumps every frame through ffmpeg, works out when each frame
//! was captured, draws that instant onto the frame, and encodes the frames back into a video
//! at the original frame rate. See [`pipeline::run_pipeline`].

pub mod assemble;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod render;
pub mod scratch;
pub mod sequence;
pub mod timelapse;
pub mod timestamp;
pub mod video;

pub use engine::ffmpeg::{EngineConfig, FfmpegEngine};
pub use engine::{CancelToken, EncodeSettings, MediaEngine};
pub use error::{PipelineError, Stage};
pub use pipeline::{run_pipeline, PipelineConfig, RunSummary};
pub use render::TextColor;
pub use timestamp::format::{DisplayZone, TimestampFormat};

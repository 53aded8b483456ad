use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voidlapse", about = "Burn capture timestamps into videos and build timelapses")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// ffmpeg binary used to extract and encode frames.
    #[arg(long, global = true, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe binary used to read video metadata.
    #[arg(long, global = true, default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// Directory under which per-run scratch directories are created.
    #[arg(long, global = true)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Overlay each frame of a video with the instant it was captured.
    Timestamp {
        /// Path to the input video file.
        #[arg(short, long)]
        input: PathBuf,

        /// Path to write the timestamped video (overwritten if present).
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        overlay: OverlayArgs,
    },

    /// Build a 30 fps timelapse from a directory of image_NNNNN.jpg stills.
    Build {
        /// Directory holding the captured stills.
        #[arg(long)]
        input_dir: PathBuf,

        /// Directory to write the timelapse into.
        #[arg(long, default_value = "../timelapse_photos")]
        output_dir: PathBuf,

        /// Also write a timestamped copy (ts_<name>).
        #[arg(short, long)]
        timestamp: bool,

        #[command(flatten)]
        overlay: OverlayArgs,
    },
}

#[derive(Args)]
pub struct OverlayArgs {
    /// Text color: white or black. Anything else is treated as white.
    #[arg(short, long, default_value = "white")]
    pub color: String,

    /// Timestamp format: datetime, date, or time. Anything else is treated as datetime.
    #[arg(short, long, default_value = "datetime")]
    pub format: String,

    /// Show timestamps in UTC instead of the local time zone.
    #[arg(long)]
    pub utc: bool,

    /// TrueType/OpenType font to draw with, tried before the system defaults.
    #[arg(long)]
    pub font: Option<PathBuf>,
}

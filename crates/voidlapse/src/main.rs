mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use voidlapse_core::timelapse::{self, TimelapseOptions};
use voidlapse_core::{
    run_pipeline, CancelToken, DisplayZone, EngineConfig, FfmpegEngine, PipelineConfig,
    TextColor, TimestampFormat,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    let engine = FfmpegEngine::new(
        EngineConfig {
            ffmpeg: cli.ffmpeg,
            ffprobe: cli.ffprobe,
        },
        cancel.clone(),
    );

    match cli.command {
        cli::Command::Timestamp {
            input,
            output,
            overlay,
        } => {
            info!(?input, ?output, "starting timestamp overlay");
            let config = pipeline_config(&overlay, cli.scratch_dir, cancel);

            let summary =
                run_pipeline(&engine, &input, &output, &config).context("pipeline failed")?;

            info!(
                frame_count = summary.frame_count,
                frame_rate = %summary.frame_rate,
                origin = %summary.origin.source,
                first = %summary.first_timestamp,
                last = %summary.last_timestamp,
                ?output,
                "timestamped video written"
            );
            Ok(())
        }
        cli::Command::Build {
            input_dir,
            output_dir,
            timestamp,
            overlay,
        } => {
            let input_dir = std::path::absolute(&input_dir)
                .with_context(|| format!("invalid input directory {}", input_dir.display()))?;
            let output_dir = std::path::absolute(&output_dir)
                .with_context(|| format!("invalid output directory {}", output_dir.display()))?;

            let options = TimelapseOptions {
                timestamp: timestamp
                    .then(|| pipeline_config(&overlay, cli.scratch_dir.clone(), cancel)),
                scratch_root: cli.scratch_dir,
                ..TimelapseOptions::default()
            };

            let started = std::time::Instant::now();
            let out = timelapse::build_timelapse(&engine, &input_dir, &output_dir, &options)
                .context("timelapse build failed")?;

            info!(
                video = ?out.video,
                image_count = out.image_count,
                elapsed = ?started.elapsed(),
                "timelapse written"
            );
            if let Some((ts_video, summary)) = &out.timestamped {
                info!(
                    ?ts_video,
                    frame_count = summary.frame_count,
                    "timestamped timelapse written"
                );
            }
            Ok(())
        }
    }
}

fn pipeline_config(
    overlay: &cli::OverlayArgs,
    scratch_root: Option<std::path::PathBuf>,
    cancel: CancelToken,
) -> PipelineConfig {
    PipelineConfig {
        color: TextColor::from_name(&overlay.color),
        format: TimestampFormat::from_name(&overlay.format),
        zone: if overlay.utc {
            DisplayZone::Utc
        } else {
            DisplayZone::Local
        },
        font_path: overlay.font.clone(),
        scratch_root,
        cancel,
        ..PipelineConfig::default()
    }
}

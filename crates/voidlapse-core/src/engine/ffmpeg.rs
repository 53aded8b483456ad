use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{CancelToken, EncodeSettings, EngineError, ImageSequence, MediaEngine};
use crate::video::probe::FrameRate;

/// How often a running tool is checked for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Names of the external binaries.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// [`MediaEngine`] backed by the ffmpeg and ffprobe command-line tools.
pub struct FfmpegEngine {
    config: EngineConfig,
    cancel: CancelToken,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    fn ffprobe(&self) -> Command {
        let mut cmd = Command::new(&self.config.ffprobe);
        cmd.args(["-v", "error"]);
        cmd
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.config.ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-y"]);
        cmd
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, input: &Path) -> Result<String, EngineError> {
        info!(?input, "probing video metadata with ffprobe");

        let mut cmd = self.ffprobe();
        cmd.args([
            "-select_streams", "v:0",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(input);

        run_to_completion(cmd, &self.cancel)
    }

    fn frame_offsets(&self, input: &Path) -> Result<String, EngineError> {
        info!(?input, "querying per-frame presentation timestamps");

        let mut cmd = self.ffprobe();
        cmd.args([
            "-select_streams", "v:0",
            "-show_entries", "frame=pts_time",
            "-of", "csv=p=0",
        ])
        .arg(input);

        run_to_completion(cmd, &self.cancel)
    }

    fn extract_frames(&self, input: &Path, pattern: &Path) -> Result<(), EngineError> {
        info!(?input, ?pattern, "extracting frames with ffmpeg");

        // passthrough keeps every decoded frame with its own timestamp; no dup/drop to a CFR grid.
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(input)
            .args(["-fps_mode", "passthrough", "-start_number", "0"])
            .arg(pattern);

        run_to_completion(cmd, &self.cancel).map(drop)
    }

    fn encode(
        &self,
        frames: &ImageSequence,
        frame_rate: FrameRate,
        settings: &EncodeSettings,
        output: &Path,
    ) -> Result<(), EngineError> {
        info!(
            pattern = ?frames.pattern,
            start_number = frames.start_number,
            %frame_rate,
            codec = %settings.codec,
            ?output,
            "encoding frames with ffmpeg"
        );

        let mut cmd = self.ffmpeg();
        cmd.arg("-framerate")
            .arg(frame_rate.to_string())
            .arg("-start_number")
            .arg(frames.start_number.to_string())
            .arg("-i")
            .arg(&frames.pattern)
            .arg("-c:v")
            .arg(&settings.codec)
            .arg("-pix_fmt")
            .arg(&settings.pixel_format)
            .arg("-preset")
            .arg(&settings.preset)
            .arg(output);

        run_to_completion(cmd, &self.cancel).map(drop)
    }
}

/// Run `cmd`, blocking until it exits, and return its stdout.
///
/// stdout and stderr are drained on helper threads so a chatty tool never stalls on a full
/// pipe while we poll for exit. A cancelled token kills and reaps the child.
fn run_to_completion(mut cmd: Command, cancel: &CancelToken) -> Result<String, EngineError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(command = ?cmd, "spawning external tool");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_or_cancel(&mut child, cancel, &program) {
        Ok(status) => status,
        Err(e) => {
            let _ = stdout.join();
            let _ = stderr.join();
            return Err(e);
        }
    };

    let stdout = collect(stdout, &program)?;
    let stderr = collect(stderr, &program)?;

    if !status.success() {
        let stderr = stderr.trim().to_string();
        error!(%program, %status, %stderr, "external tool failed");
        return Err(EngineError::Exit {
            program,
            status,
            stderr,
        });
    }

    if !stderr.trim().is_empty() {
        debug!(%program, stderr = %stderr.trim(), "external tool reported warnings");
    }
    Ok(stdout)
}

fn wait_or_cancel(
    child: &mut Child,
    cancel: &CancelToken,
    program: &str,
) -> Result<ExitStatus, EngineError> {
    loop {
        if cancel.is_cancelled() {
            warn!(%program, pid = child.id(), "cancellation requested, killing external tool");
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Cancelled {
                program: program.to_string(),
            });
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

fn collect(
    handle: JoinHandle<std::io::Result<String>>,
    program: &str,
) -> Result<String, EngineError> {
    match handle.join() {
        Ok(result) => result.map_err(|source| EngineError::Io {
            program: program.to_string(),
            source,
        }),
        Err(_) => Err(EngineError::Io {
            program: program.to_string(),
            source: std::io::Error::other("pipe reader thread panicked"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(ffmpeg: &str, ffprobe: &str) -> FfmpegEngine {
        FfmpegEngine::new(
            EngineConfig {
                ffmpeg: PathBuf::from(ffmpeg),
                ffprobe: PathBuf::from(ffprobe),
            },
            CancelToken::new(),
        )
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let engine = engine_with("voidlapse-no-such-ffmpeg", "voidlapse-no-such-ffprobe");
        let err = engine.probe(Path::new("input.mp4")).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported_with_status() {
        let err = run_to_completion(Command::new("false"), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, EngineError::Exit { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_captured() {
        let mut cmd = Command::new("echo");
        cmd.arg("30/1");
        let out = run_to_completion(cmd, &CancelToken::new()).unwrap();
        assert_eq!(out.trim(), "30/1");
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_token_kills_running_tool() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let err = run_to_completion(cmd, &cancel).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled { .. }), "got {err:?}");
    }
}

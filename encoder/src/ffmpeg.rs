use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use chrono::Utc;
use gym_stream_common::config::CaptureConfig;
use gym_stream_common::frame::{Frame, FrameShape};
use tracing::{debug, error, info, warn};

use crate::paths::local_video_path;
use crate::sink::{FrameSink, SessionSummary, SinkFactory, StreamError, StreamSpec};

/// Where the encoded video goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// RTMP ingest URL (address + stream key).
    Remote(String),
    /// Local MP4 file.
    Local(PathBuf),
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Remote(url) => url.clone(),
            Target::Local(path) => path.display().to_string(),
        }
    }
}

/// Opens an [`FfmpegStreamer`] per session using the `[capture]` settings.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFactory {
    settings: CaptureConfig,
}

impl FfmpegFactory {
    pub fn new(settings: CaptureConfig) -> Self {
        Self { settings }
    }
}

impl SinkFactory for FfmpegFactory {
    type Sink = FfmpegStreamer;

    fn open(&self, spec: &StreamSpec) -> Result<FfmpegStreamer, StreamError> {
        FfmpegStreamer::start(spec, &self.settings)
    }
}

/// Lines of ffmpeg stderr kept for the error reported on close.
const STDERR_TAIL_LINES: usize = 20;

/// An ffmpeg subprocess fed raw frames on stdin.
pub struct FfmpegStreamer {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<String>>>,
    shape: FrameShape,
    target: Target,
    frame_count: u64,
}

impl FfmpegStreamer {
    /// Spawn ffmpeg ready to receive raw frames of `spec.shape`.
    ///
    /// A non-empty destination is streamed as FLV; otherwise the video is
    /// recorded to a timestamped MP4 under `settings.output_dir`.
    pub fn start(spec: &StreamSpec, settings: &CaptureConfig) -> Result<Self, StreamError> {
        let target = if spec.is_remote() {
            Target::Remote(spec.destination.clone())
        } else {
            std::fs::create_dir_all(&settings.output_dir).map_err(|e| {
                StreamError::Streaming(format!(
                    "failed to create {}: {e}",
                    settings.output_dir.display()
                ))
            })?;
            Target::Local(local_video_path(
                &settings.output_dir,
                Utc::now().timestamp_millis(),
            ))
        };

        let args = ffmpeg_args(spec, &target, settings)?;

        let mut child = Command::new(&settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&settings.ffmpeg_path, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StreamError::Streaming("could not get ffmpeg stdin handle".into()))?;
        let stderr = child.stderr.take().map(drain_stderr);

        info!(
            shape = %spec.shape,
            fps = spec.fps,
            output_fps = spec.output_fps,
            codec = settings.codec,
            target = target.describe(),
            "ffmpeg streamer started"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr,
            shape: spec.shape,
            target,
            frame_count: 0,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn join_stderr(&mut self) -> Vec<String> {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Describe a failed pipe write, including ffmpeg's exit status if it has
    /// already gone away.
    fn write_error(&mut self, e: std::io::Error) -> StreamError {
        let status = self
            .child
            .as_mut()
            .and_then(|c| c.try_wait().ok().flatten());
        match status {
            Some(status) => {
                StreamError::Streaming(format!("ffmpeg exited with {status} ({e})"))
            }
            None => StreamError::Streaming(format!("failed to write frame to ffmpeg stdin: {e}")),
        }
    }
}

impl FrameSink for FfmpegStreamer {
    fn capture_frame(&mut self, frame: &Frame) -> Result<(), StreamError> {
        validate_frame(self.shape, frame)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StreamError::Streaming("streamer already closed".into()))?;
        if let Err(e) = stdin.write_all(frame.data()) {
            return Err(self.write_error(e));
        }
        self.frame_count += 1;
        debug!(frame_count = self.frame_count, "pushed frame to ffmpeg");
        Ok(())
    }

    /// Close stdin so ffmpeg finalizes the output, then wait for it to exit.
    fn close(mut self) -> Result<SessionSummary, StreamError> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Err(StreamError::Streaming("streamer already closed".into()));
        };

        let status = child
            .wait()
            .map_err(|e| StreamError::Streaming(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = self.join_stderr().join("\n");

        if !status.success() {
            error!(stderr = %stderr, status = %status, "ffmpeg exited with error");
            return Err(StreamError::Streaming(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }

        info!(
            frame_count = self.frame_count,
            target = self.target.describe(),
            "ffmpeg streamer finished"
        );

        Ok(SessionSummary {
            frame_count: self.frame_count,
            destination: self.target.describe(),
        })
    }
}

impl Drop for FfmpegStreamer {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            if let Err(e) = child.wait() {
                warn!(error = %e, "failed to reap ffmpeg after drop");
            }
            self.join_stderr();
        }
    }
}

/// Read ffmpeg's stderr until it closes so the pipe never fills up and
/// blocks frame writes. Each line is logged; the last few are returned.
fn drain_stderr<R: Read + Send + 'static>(stderr: R) -> JoinHandle<Vec<String>> {
    std::thread::spawn(move || {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            warn!(line = %line, "ffmpeg");
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into()
    })
}

fn spawn_error(binary: &str, e: std::io::Error) -> StreamError {
    if e.kind() == ErrorKind::NotFound {
        StreamError::DependencyMissing(format!(
            "{binary} not found; install ffmpeg with libx264 support"
        ))
    } else {
        StreamError::Streaming(format!("failed to spawn {binary}: {e}"))
    }
}

/// Every frame of a session must match the shape the encoder was opened with.
pub fn validate_frame(expected: FrameShape, frame: &Frame) -> Result<(), StreamError> {
    if frame.shape() != expected {
        return Err(StreamError::InvalidFrame(format!(
            "expected shape {expected}, got {}",
            frame.shape()
        )));
    }
    Ok(())
}

fn pixel_format(channels: u8) -> Result<&'static str, StreamError> {
    match channels {
        3 => Ok("rgb24"),
        4 => Ok("rgba"),
        n => Err(StreamError::InvalidFrame(format!(
            "frames must have 3 (RGB) or 4 (RGBA) channels, got {n}"
        ))),
    }
}

/// Command line for an ffmpeg process reading raw frames from stdin.
pub fn ffmpeg_args(
    spec: &StreamSpec,
    target: &Target,
    settings: &CaptureConfig,
) -> Result<Vec<String>, StreamError> {
    let pix_fmt = pixel_format(spec.shape.channels)?;

    let mut args: Vec<String> = [
        "-y", "-loglevel", "error",
        "-f", "rawvideo",
        "-vcodec", "rawvideo",
        "-pix_fmt", pix_fmt,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        "-s".to_string(),
        format!("{}x{}", spec.shape.width, spec.shape.height),
        "-r".to_string(),
        spec.fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        // yuv420p needs even dimensions
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-c:v".to_string(),
        settings.codec.clone(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        spec.output_fps.to_string(),
    ]);

    match target {
        Target::Remote(url) => {
            if supports_zerolatency(&settings.codec) {
                args.extend(["-tune".to_string(), "zerolatency".to_string()]);
            }
            args.extend(["-f".to_string(), "flv".to_string(), url.clone()]);
        }
        Target::Local(path) => args.extend([
            "-crf".to_string(),
            settings.crf.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            path.display().to_string(),
        ]),
    }

    Ok(args)
}

/// Only the x264/x265 encoders accept `-tune zerolatency`.
fn supports_zerolatency(codec: &str) -> bool {
    matches!(codec, "libx264" | "libx265")
}

/// Check whether ffmpeg can be run. Logs a warning if not.
pub fn check_ffmpeg_available(binary: &str) -> bool {
    match Command::new(binary).arg("-version").output() {
        Ok(out) if out.status.success() => {
            debug!(binary, "ffmpeg is available");
            true
        }
        Ok(_) => {
            warn!(binary, "ffmpeg returned non-zero for -version; streaming may fail");
            false
        }
        Err(e) => {
            warn!(
                binary,
                error = %e,
                "ffmpeg not found; the wrapper will fall back to plain rendering. \
                 Install ffmpeg with libx264 support."
            );
            false
        }
    }
}

pub mod ffmpeg;
pub mod paths;
pub mod sink;

pub use ffmpeg::{check_ffmpeg_available, FfmpegFactory, FfmpegStreamer};
pub use sink::{FrameSink, SessionSummary, SinkFactory, StreamError, StreamSpec};

use gym_stream_common::frame::{Frame, FrameShape};

/// Everything a sink needs to know before the first frame arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub shape: FrameShape,
    /// Rate at which frames are captured.
    pub fps: u32,
    /// Rate of the encoded output.
    pub output_fps: u32,
    /// Remote URL, or empty for a local recording.
    pub destination: String,
}

impl StreamSpec {
    pub fn is_remote(&self) -> bool {
        !self.destination.is_empty()
    }
}

/// What a sink did over its lifetime, reported on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frame_count: u64,
    pub destination: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("dependency not installed: {0}")]
    DependencyMissing(String),
    #[error("streaming error: {0}")]
    Streaming(String),
}

impl StreamError {
    /// Short tag for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::InvalidFrame(_) => "invalid_frame",
            StreamError::DependencyMissing(_) => "dependency_missing",
            StreamError::Streaming(_) => "streaming",
        }
    }
}

/// Receives rendered frames and moves them somewhere: a network stream, a
/// file, or a test buffer.
pub trait FrameSink {
    fn capture_frame(&mut self, frame: &Frame) -> Result<(), StreamError>;

    /// Flush and release the sink. Consuming `self` means a sink is closed
    /// at most once.
    fn close(self) -> Result<SessionSummary, StreamError>;
}

/// Builds a sink once the shape of the first frame is known.
pub trait SinkFactory {
    type Sink: FrameSink;

    fn open(&self, spec: &StreamSpec) -> Result<Self::Sink, StreamError>;
}

impl<F, S> SinkFactory for F
where
    F: Fn(&StreamSpec) -> Result<S, StreamError>,
    S: FrameSink,
{
    type Sink = S;

    fn open(&self, spec: &StreamSpec) -> Result<S, StreamError> {
        self(spec)
    }
}

use gym_stream_common::destination::{resolve_destination, StreamInfo};
use gym_stream_common::frame::{Frame, FrameShape};
use gym_stream_encoder::sink::{FrameSink, SinkFactory, StreamError, StreamSpec};
use tracing::{debug, info, warn};

use crate::env::{Env, EnvMetadata, RenderMode, RenderOutput, Step};

/// Outcome of [`VideoStreamingWrapper::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// The frame was handed to the streamer.
    Captured,
    /// Streaming is off; this is what the environment rendered.
    Raw(RenderOutput),
}

impl Rendered {
    pub fn is_captured(&self) -> bool {
        matches!(self, Rendered::Captured)
    }
}

/// Wraps an environment and sends every rendered frame to a streamer.
///
/// The streamer is opened on the first successful render, once the frame
/// shape is known. Any failure while capturing switches the wrapper to
/// pass-through for the rest of its life; `render` never fails.
pub struct VideoStreamingWrapper<E, F: SinkFactory> {
    env: E,
    factory: F,
    enabled: bool,
    frames_per_sec: u32,
    output_frames_per_sec: u32,
    stream_url: String,
    streamer: Option<F::Sink>,
}

impl<E: Env, F: SinkFactory> VideoStreamingWrapper<E, F> {
    pub fn new(env: E, factory: F, stream_info: Option<&StreamInfo>) -> Self {
        let metadata = env.metadata();
        let fps = metadata.render_fps.unwrap_or(0);
        let mut enabled = true;
        let mut stream_url = String::new();

        if !metadata.supports(RenderMode::RgbArray) {
            enabled = false;
            warn!(
                modes = ?metadata.render_modes,
                "disabling video streaming wrapper: environment does not support 'rgb_array'"
            );
        } else if fps == 0 {
            enabled = false;
            warn!("disabling video streaming wrapper: environment declares no render_fps");
        } else {
            stream_url = resolve_destination(stream_info);
        }

        Self {
            env,
            factory,
            enabled,
            frames_per_sec: fps,
            output_frames_per_sec: fps,
            stream_url,
            streamer: None,
        }
    }

    /// Encode at `fps` instead of the environment's `render_fps`.
    pub fn with_output_fps(mut self, fps: u32) -> Self {
        if fps == 0 {
            warn!("ignoring output fps of 0");
        } else {
            self.output_frames_per_sec = fps;
        }
        self
    }

    /// Render one frame and forward it to the streamer.
    pub fn render(&mut self) -> Rendered {
        if !self.enabled {
            return Rendered::Raw(self.env.render());
        }

        let frame = match self.env.render().into_frame() {
            Ok(frame) => frame,
            Err(output) => {
                self.disable(&StreamError::InvalidFrame(
                    "environment did not return a pixel array".into(),
                ));
                return Rendered::Raw(output);
            }
        };

        match self.capture(&frame) {
            Ok(()) => Rendered::Captured,
            Err(e) => {
                self.disable(&e);
                Rendered::Raw(RenderOutput::Frame(frame))
            }
        }
    }

    /// Close the environment, then release the streamer if one was opened.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        self.env.close();
        let was_enabled = std::mem::replace(&mut self.enabled, false);

        match self.streamer.take() {
            Some(streamer) => match streamer.close() {
                Ok(summary) => info!(
                    frame_count = summary.frame_count,
                    destination = summary.destination,
                    "video streaming wrapper closed"
                ),
                Err(e) => warn!(
                    error = %e,
                    kind = e.kind(),
                    "streamer did not shut down cleanly"
                ),
            },
            None if was_enabled => {
                info!("environment closed before video streaming wrapper could capture anything")
            }
            None => {}
        }
    }

    pub fn reset(&mut self, seed: Option<u64>) -> E::Obs {
        self.env.reset(seed)
    }

    pub fn step(&mut self, action: E::Act) -> Step<E::Obs> {
        self.env.step(action)
    }

    pub fn metadata(&self) -> &EnvMetadata {
        self.env.metadata()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True once a streamer has been opened and not yet closed.
    pub fn is_streaming(&self) -> bool {
        self.streamer.is_some()
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn frames_per_sec(&self) -> u32 {
        self.frames_per_sec
    }

    pub fn output_frames_per_sec(&self) -> u32 {
        self.output_frames_per_sec
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Release the streamer and hand back the environment.
    pub fn into_inner(mut self) -> E {
        if let Some(streamer) = self.streamer.take() {
            if let Err(e) = streamer.close() {
                warn!(error = %e, "streamer did not shut down cleanly");
            }
        }
        self.env
    }

    fn capture(&mut self, frame: &Frame) -> Result<(), StreamError> {
        if self.streamer.is_none() {
            let streamer = self.open_streamer(frame.shape())?;
            self.streamer = Some(streamer);
        }
        if let Some(streamer) = self.streamer.as_mut() {
            streamer.capture_frame(frame)?;
            debug!("frame captured");
        }
        Ok(())
    }

    fn open_streamer(&self, shape: FrameShape) -> Result<F::Sink, StreamError> {
        let spec = StreamSpec {
            shape,
            fps: self.frames_per_sec,
            output_fps: self.output_frames_per_sec,
            destination: self.stream_url.clone(),
        };
        let streamer = self.factory.open(&spec)?;
        info!(
            shape = %shape,
            fps = spec.fps,
            output_fps = spec.output_fps,
            remote = spec.is_remote(),
            "streamer opened"
        );
        Ok(streamer)
    }

    fn disable(&mut self, e: &StreamError) {
        self.enabled = false;
        match e {
            StreamError::InvalidFrame(msg) => {
                warn!(error = %msg, "video streaming wrapper disabled: invalid frame")
            }
            StreamError::DependencyMissing(msg) => {
                warn!(error = %msg, "video streaming wrapper disabled: missing dependency")
            }
            StreamError::Streaming(msg) => {
                warn!(error = %msg, "video streaming wrapper exited with an error")
            }
        }
    }
}

use gym_stream_common::frame::Frame;
use std::fmt;
use std::str::FromStr;

/// Ways an environment can render itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Draws to a window.
    Human,
    /// Returns a text rendering.
    Ansi,
    /// Returns a raw pixel buffer.
    RgbArray,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Human => "human",
            RenderMode::Ansi => "ansi",
            RenderMode::RgbArray => "rgb_array",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(RenderMode::Human),
            "ansi" => Ok(RenderMode::Ansi),
            "rgb_array" => Ok(RenderMode::RgbArray),
            other => Err(format!("unknown render mode '{other}'")),
        }
    }
}

/// Rendering capabilities an environment declares up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMetadata {
    pub render_modes: Vec<RenderMode>,
    pub render_fps: Option<u32>,
}

impl EnvMetadata {
    pub fn new(render_modes: Vec<RenderMode>, render_fps: u32) -> Self {
        Self {
            render_modes,
            render_fps: Some(render_fps),
        }
    }

    pub fn supports(&self, mode: RenderMode) -> bool {
        self.render_modes.contains(&mode)
    }
}

/// Whatever a single `render` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    Frame(Frame),
    Text(String),
    /// Rendered somewhere else (a window), or not at all.
    Nothing,
}

impl RenderOutput {
    pub fn into_frame(self) -> Result<Frame, RenderOutput> {
        match self {
            RenderOutput::Frame(frame) => Ok(frame),
            other => Err(other),
        }
    }
}

/// Result of one environment transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
}

impl<O> Step<O> {
    pub fn new(observation: O, reward: f64, terminated: bool, truncated: bool) -> Self {
        Self {
            observation,
            reward,
            terminated,
            truncated,
        }
    }

    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A simulation environment driven one step at a time.
pub trait Env {
    type Obs;
    type Act;

    fn metadata(&self) -> &EnvMetadata;

    fn reset(&mut self, seed: Option<u64>) -> Self::Obs;

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs>;

    fn render(&mut self) -> RenderOutput;

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_stream_common::frame::FrameShape;

    #[test]
    fn render_mode_names_round_trip() {
        for mode in [RenderMode::Human, RenderMode::Ansi, RenderMode::RgbArray] {
            assert_eq!(mode.as_str().parse::<RenderMode>().unwrap(), mode);
        }
        assert!("rgb".parse::<RenderMode>().is_err());
    }

    #[test]
    fn metadata_supports() {
        let meta = EnvMetadata::new(vec![RenderMode::Human], 30);
        assert!(meta.supports(RenderMode::Human));
        assert!(!meta.supports(RenderMode::RgbArray));
    }

    #[test]
    fn into_frame_only_for_frames() {
        let frame = Frame::filled(FrameShape::new(1, 1, 3), 7).unwrap();
        assert_eq!(RenderOutput::Frame(frame.clone()).into_frame(), Ok(frame));
        assert_eq!(
            RenderOutput::Text("x".into()).into_frame(),
            Err(RenderOutput::Text("x".into()))
        );
    }

    #[test]
    fn step_done() {
        assert!(Step::new((), 1.0, true, false).done());
        assert!(Step::new((), 1.0, false, true).done());
        assert!(!Step::new((), 1.0, false, false).done());
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::destination::StreamInfo;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote destination. Both fields must be non-empty for frames to leave the
/// machine; otherwise the sink records locally.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Overrides the environment's `render_fps` for the encoded output.
    #[serde(default)]
    pub output_fps: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_episodes")]
    pub episodes: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            output_dir: default_output_dir(),
            codec: default_codec(),
            preset: default_preset(),
            crf: default_crf(),
            output_fps: None,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            max_steps: default_max_steps(),
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl StreamConfig {
    /// The destination descriptor handed to the wrapper, or `None` when the
    /// `[stream]` table was left out entirely.
    pub fn stream_info(&self) -> Option<StreamInfo> {
        if self.url.is_none() && self.secret.is_none() {
            return None;
        }
        Some(StreamInfo {
            url: self.url.clone(),
            secret: self.secret.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("videos")
}
fn default_codec() -> String {
    "libx264".into()
}
fn default_preset() -> String {
    "veryfast".into()
}
fn default_crf() -> u32 {
    23
}
fn default_episodes() -> u32 {
    100
}
fn default_max_steps() -> u32 {
    500
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.capture.ffmpeg_path, "ffmpeg");
        assert_eq!(config.capture.output_dir, PathBuf::from("videos"));
        assert_eq!(config.capture.crf, 23);
        assert_eq!(config.demo.episodes, 100);
        assert_eq!(config.logging.level, "info");
        assert!(config.stream.stream_info().is_none());
    }

    #[test]
    fn stream_section_becomes_descriptor() {
        let config = Config::parse(
            r#"
            [stream]
            url = "rtmp://live.example.com/app/"
            secret = "key-123"

            [capture]
            output_fps = 60
            "#,
        )
        .unwrap();
        let info = config.stream.stream_info().unwrap();
        assert_eq!(info.url.as_deref(), Some("rtmp://live.example.com/app/"));
        assert_eq!(info.secret.as_deref(), Some("key-123"));
        assert_eq!(config.capture.output_fps, Some(60));
        assert_eq!(config.capture.codec, "libx264");
    }

    #[test]
    fn partial_stream_section_is_still_a_descriptor() {
        let config = Config::parse("[stream]\nurl = \"rtmp://x/\"\n").unwrap();
        let info = config.stream.stream_info().unwrap();
        assert!(info.secret.is_none());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = Config::parse("[demo]\nepisodes = \"many\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("gym-stream-no-such-config.toml");
        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::ReadFile(_, _))));
    }
}

mod cartpole;

use cartpole::CartPole;
use gym_stream_common::config::{Config, ConfigError};
use gym_stream_encoder::{check_ffmpeg_available, FfmpegFactory};
use gym_stream_wrapper::{RenderMode, VideoStreamingWrapper};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("episode loop did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Default)]
struct RunSummary {
    episodes: u32,
    steps: u64,
    captured: u64,
    interrupted: bool,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    if let Err(e) = run(config).await {
        error!(error = %e, "demo failed");
        std::process::exit(1);
    }
}

/// An explicit path must load; otherwise `config.toml` is used when present
/// and the built-in defaults when it is not.
fn load_config(path: Option<&Path>) -> Result<Config, DemoError> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(Config::load(Path::new(DEFAULT_CONFIG))?),
        None => Ok(Config::default()),
    }
}

async fn run(config: Config) -> Result<(), DemoError> {
    info!(
        episodes = config.demo.episodes,
        max_steps = config.demo.max_steps,
        remote = config.stream.stream_info().is_some(),
        output_dir = %config.capture.output_dir.display(),
        "starting gym-stream demo"
    );

    check_ffmpeg_available(&config.capture.ffmpeg_path);

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current step");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let summary = tokio::task::spawn_blocking(move || run_episodes(&config, &stop)).await?;

    info!(
        episodes = summary.episodes,
        steps = summary.steps,
        captured = summary.captured,
        interrupted = summary.interrupted,
        "demo finished"
    );
    Ok(())
}

/// Drive CartPole with random actions, rendering every step through the
/// streaming wrapper. The wrapper is always closed before returning.
fn run_episodes(config: &Config, stop: &AtomicBool) -> RunSummary {
    let stream_info = config.stream.stream_info();
    let mut env = VideoStreamingWrapper::new(
        CartPole::new(RenderMode::RgbArray, config.demo.seed),
        FfmpegFactory::new(config.capture.clone()),
        stream_info.as_ref(),
    );
    if let Some(fps) = config.capture.output_fps {
        env = env.with_output_fps(fps);
    }

    let mut rng = match config.demo.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let mut summary = RunSummary::default();

    env.reset(config.demo.seed);
    'episodes: while summary.episodes < config.demo.episodes {
        let mut episode_steps = 0u32;
        loop {
            if stop.load(Ordering::SeqCst) {
                summary.interrupted = true;
                break 'episodes;
            }
            if env.render().is_captured() {
                summary.captured += 1;
            }
            let step = env.step(rng.gen_range(0..2));
            summary.steps += 1;
            episode_steps += 1;
            if step.terminated || episode_steps >= config.demo.max_steps {
                break;
            }
        }
        summary.episodes += 1;
        debug!(
            episode = summary.episodes,
            steps = episode_steps,
            final_state = ?env.inner().state(),
            "episode finished"
        );
        env.reset(None);
    }

    env.close();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config(episodes: u32) -> Config {
        let mut config = Config::default();
        config.demo.episodes = episodes;
        config.demo.max_steps = 20;
        config.demo.seed = Some(11);
        config.capture.ffmpeg_path = "/nonexistent/gym-stream-ffmpeg".into();
        config.capture.output_dir = std::env::temp_dir().join("gym-stream-demo-test");
        config
    }

    #[test]
    fn missing_ffmpeg_degrades_to_plain_rendering() {
        let config = offline_config(3);
        let stop = AtomicBool::new(false);
        let summary = run_episodes(&config, &stop);

        assert_eq!(summary.episodes, 3);
        assert_eq!(summary.captured, 0);
        assert!(summary.steps >= 3);
        assert!(!summary.interrupted);
    }

    #[test]
    fn stop_flag_ends_the_run() {
        let config = offline_config(100);
        let stop = AtomicBool::new(true);
        let summary = run_episodes(&config, &stop);

        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.steps, 0);
        assert!(summary.interrupted);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let path = std::env::temp_dir().join("gym-stream-no-such-demo.toml");
        assert!(matches!(
            load_config(Some(&path)),
            Err(DemoError::Config(ConfigError::ReadFile(_, _)))
        ));
    }
}

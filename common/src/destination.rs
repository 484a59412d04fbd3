use tracing::{info, warn};

/// Caller-supplied description of where to stream: a base address plus an
/// access token appended to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub url: Option<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamInfoError {
    #[error("stream info has no URL")]
    MissingUrl,
    #[error("stream info has no secret")]
    MissingSecret,
}

impl StreamInfo {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            secret: Some(secret.into()),
        }
    }

    /// `url` followed by `secret`. Both must be present and non-empty.
    pub fn compose(&self) -> Result<String, StreamInfoError> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(StreamInfoError::MissingUrl)?;
        let secret = self
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(StreamInfoError::MissingSecret)?;
        Ok(format!("{url}{secret}"))
    }
}

/// Resolve the optional descriptor into a destination string. An empty
/// string means "no remote destination".
pub fn resolve_destination(info: Option<&StreamInfo>) -> String {
    let Some(info) = info else {
        warn!("no stream info provided; video will be recorded locally instead of streamed");
        return String::new();
    };
    match info.compose() {
        Ok(destination) => {
            info!("video streaming wrapper is ready to stream");
            destination
        }
        Err(e) => {
            warn!(error = %e, "stream info is malformed; video will be recorded locally instead of streamed");
            String::new()
        }
    }
}

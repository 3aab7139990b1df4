use thiserror::Error;

/// Failures the render core can report. The CLI layer wraps these in
/// `anyhow` with extra context.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Primary audio could not be read or decoded. Fatal before any frame.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio is too short to produce a single frame ({samples} samples at {sample_rate}Hz, {fps}fps)")]
    AudioTooShort {
        samples: usize,
        sample_rate: u32,
        fps: u32,
    },

    /// ffmpeg failed to start, closed its input early or exited non-zero.
    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("failed to load asset {path}: {reason}")]
    Asset { path: String, reason: String },

    #[error("invalid subtitle segment {text:?}: start {start_ms}ms is after end {end_ms}ms")]
    InvalidSubtitle {
        text: String,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RenderError {
    pub fn asset(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        Self::Asset {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<symphonia::core::errors::Error> for RenderError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

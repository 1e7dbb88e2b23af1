use std::time::Duration;

use thiserror::Error;

/// Reasons a single detection is dropped before association.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("malformed detection: {0}")]
    Malformed(String),
    #[error("degenerate box {width}x{height}")]
    DegenerateBox { width: f64, height: f64 },
}

/// Failure of one detector round trip. Never fatal to tracking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("detector transport failed: {0}")]
    Transport(String),
    #[error("detector timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not decode detector response: {0}")]
    Decode(String),
    #[error("detector panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn detection worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("detection worker is no longer running")]
    WorkerGone,
}

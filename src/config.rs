use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How detections are paired with existing tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Per-detection best IoU in input order.
    #[default]
    Greedy,
    /// Hungarian assignment over the whole batch.
    Optimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU for a detection to continue an existing track.
    pub match_iou: f64,
    /// Time since the last match after which a track is purged.
    pub ttl_ms: u64,
    /// Weight of a new detection's confidence in the score average.
    pub score_blend: f64,
    /// Convergence rate of the displayed box, per second.
    pub smoothing_rate: f64,
    /// Upper bound on the elapsed time fed to the smoother in one tick.
    pub max_smoothing_step_ms: u64,
    pub assignment: AssignmentStrategy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_iou: 0.3,
            ttl_ms: 400,
            score_blend: 0.3,
            smoothing_rate: 8.0,
            max_smoothing_step_ms: 100,
            assignment: AssignmentStrategy::Greedy,
        }
    }
}

impl TrackerConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn max_smoothing_step(&self) -> Duration {
        Duration::from_millis(self.max_smoothing_step_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.match_iou) {
            return Err(ConfigError::Invalid(format!(
                "match_iou must lie in [0, 1], got {}",
                self.match_iou
            )));
        }
        if !(0.0..=1.0).contains(&self.score_blend) {
            return Err(ConfigError::Invalid(format!(
                "score_blend must lie in [0, 1], got {}",
                self.score_blend
            )));
        }
        if !(self.smoothing_rate.is_finite() && self.smoothing_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "smoothing_rate must be positive, got {}",
                self.smoothing_rate
            )));
        }
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid("ttl_ms must be non-zero".to_string()));
        }
        if self.max_smoothing_step_ms == 0 {
            return Err(ConfigError::Invalid(
                "max_smoothing_step_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between the completion of one detection request and the next.
    pub detect_interval_ms: u64,
    /// Side of the square model input.
    pub model_input_size: u32,
    /// Confidence below which local model rows are discarded.
    pub min_confidence: f64,
    pub tracker: TrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detect_interval_ms: 80,
            model_input_size: 640,
            min_confidence: 0.4,
            tracker: TrackerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_input_size == 0 {
            return Err(ConfigError::Invalid(
                "model_input_size must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.min_confidence
            )));
        }
        self.tracker.validate()
    }
}

//! Analysis configuration
//!
//! Configuration is plain serde data so it can be stored next to a corpus and
//! reloaded. Missing fields take their defaults.

use crate::error::TrajectoryError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ridge regularization strength
pub const DEFAULT_RIDGE_ALPHA: f64 = 1.0;

/// Minimum number of prompts required to train the specificity model
pub const DEFAULT_MIN_TRAINING_PROMPTS: usize = 10;

/// Guard added to the weak-target standard deviation
pub const DEFAULT_TARGET_EPSILON: f64 = 1e-9;

/// Top-level analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Keep empty/whitespace prompts as zero-signal records instead of dropping them
    pub keep_blank_prompts: bool,
    /// Specificity scorer settings
    pub specificity: SpecificityConfig,
}

/// Specificity scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificityConfig {
    /// Ridge regularization strength (> 0)
    pub alpha: f64,
    /// Training fails below this many prompts
    pub min_training_prompts: usize,
    /// Largest n-gram order (1 = unigrams only)
    pub max_ngram: usize,
    /// Terms must occur in at least this many prompts
    pub min_df: usize,
    /// Drop English stop words before building n-grams
    pub remove_stop_words: bool,
    /// Added to the weak-target standard deviation
    pub epsilon: f64,
}

impl Default for SpecificityConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_RIDGE_ALPHA,
            min_training_prompts: DEFAULT_MIN_TRAINING_PROMPTS,
            max_ngram: 2,
            min_df: 1,
            remove_stop_words: true,
            epsilon: DEFAULT_TARGET_EPSILON,
        }
    }
}

impl SpecificityConfig {
    pub fn validate(&self) -> Result<(), TrajectoryError> {
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(TrajectoryError::ConfigError(format!(
                "alpha must be positive and finite, got {}",
                self.alpha
            )));
        }
        if self.max_ngram == 0 {
            return Err(TrajectoryError::ConfigError(
                "max_ngram must be at least 1".to_string(),
            ));
        }
        if self.min_df == 0 {
            return Err(TrajectoryError::ConfigError(
                "min_df must be at least 1".to_string(),
            ));
        }
        if self.min_training_prompts < 2 {
            return Err(TrajectoryError::ConfigError(
                "min_training_prompts must be at least 2".to_string(),
            ));
        }
        if !(self.epsilon >= 0.0 && self.epsilon.is_finite()) {
            return Err(TrajectoryError::ConfigError(format!(
                "epsilon must be finite and not negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, TrajectoryError> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| TrajectoryError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_path(path: &Path) -> Result<Self, TrajectoryError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrajectoryError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, TrajectoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TrajectoryError> {
        self.specificity.validate()
    }
}

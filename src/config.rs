use crate::error::{Result, TrackingError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Defines what the config file should contain.
#[serde(default)]
pub struct Config {
    /// Whether the tracker starts with online learning enabled.
    pub learning_active: bool,
    /// How raw separator outputs are mapped to probabilities.
    pub calibration: CalibrationConfig,
    /// The trainable separator and its example memory.
    pub separator: SeparatorConfig,
    /// The reference resampling sampler.
    pub sampler: SamplerConfig,
    /// The reference position extractor.
    pub extractor: ExtractorConfig,
    /// The reference learning strategy.
    pub learning: LearningConfig,
}

/// Whether logistic parameters follow retraining or stay where they started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPolicy {
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub policy: CalibrationPolicy,
    /// The probability of the mean output of positive samples.
    pub high_probability: f64,
    /// The probability of the mean output of negative samples.
    pub low_probability: f64,
    /// The assumed mean separator output of positive samples.
    pub mean_positive_score: f64,
    /// The assumed mean separator output of negative samples.
    pub mean_negative_score: f64,
}

/// Which reference separator the measurement model trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorKind {
    /// Ridge least squares fit on positives and negatives.
    Linear,
    /// Distance to the mean positive example; learns from positives alone.
    Centroid,
}

impl SeparatorKind {
    pub fn is_one_class(self) -> bool {
        matches!(self, Self::Centroid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparatorConfig {
    pub kind: SeparatorKind,
    /// Ridge regularization of the least squares fit.
    pub regularization: f64,
    /// Distance to the centroid at which the one-class decision value crosses zero.
    pub radius: f64,
    /// Minimum number of positive examples a retrain request must carry.
    pub min_positive_examples: usize,
    /// Minimum number of negative examples a retrain request must carry. May be zero
    /// for one-class separators only.
    pub min_negative_examples: usize,
    /// Number of examples per class kept for retraining; the oldest are dropped first.
    pub max_examples_per_class: usize,
    /// Side lengths of the patch grid descriptors are sampled on.
    pub patch_width: usize,
    pub patch_height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub sample_count: usize,
    /// Fraction of each generation drawn uniformly over the frame.
    pub random_rate: f64,
    /// Standard deviation of the position diffusion relative to the sample size.
    pub position_deviation: f64,
    /// Standard deviation of the size diffusion relative to the sample size.
    pub size_deviation: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Minimum total weight of object samples to report a position.
    pub min_total_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Samples overlapping the found position at least this much become positives.
    pub positive_overlap: f64,
    /// Samples overlapping the found position at most this much may become negatives.
    pub negative_overlap: f64,
    /// Upper bound of positive examples per request, including the position itself.
    pub max_positive_examples: usize,
    /// Upper bound of negative examples per request.
    pub max_negative_examples: usize,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let Self {
            calibration,
            separator,
            sampler,
            learning,
            ..
        } = self;

        let low = calibration.low_probability;
        let high = calibration.high_probability;
        if !(0.0 < low && low < high && high < 1.0) {
            return Err(TrackingError::InvalidConfig(format!(
                "calibration probabilities must satisfy 0 < low < high < 1, got low={low}, high={high}"
            )));
        }
        if separator.patch_width == 0 || separator.patch_height == 0 {
            return Err(TrackingError::InvalidConfig(
                "patch dimensions must be positive".into(),
            ));
        }
        if separator.min_positive_examples == 0 {
            return Err(TrackingError::InvalidConfig(
                "minimum positive example count must be positive".into(),
            ));
        }
        if separator.min_negative_examples == 0 && !separator.kind.is_one_class() {
            return Err(TrackingError::InvalidConfig(format!(
                "{:?} separator needs negative examples",
                separator.kind
            )));
        }
        if !(separator.regularization >= 0.0) || !(separator.radius > 0.0) {
            return Err(TrackingError::InvalidConfig(format!(
                "regularization must be non-negative and radius positive, got {} and {}",
                separator.regularization, separator.radius
            )));
        }
        if separator.max_examples_per_class < separator.min_positive_examples
            || separator.max_examples_per_class < separator.min_negative_examples
        {
            return Err(TrackingError::InvalidConfig(
                "example memory is smaller than the minimum example count".into(),
            ));
        }
        if sampler.sample_count == 0 {
            return Err(TrackingError::InvalidConfig(
                "sample count must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&sampler.random_rate) {
            return Err(TrackingError::InvalidConfig(format!(
                "random rate must be within [0, 1], got {}",
                sampler.random_rate
            )));
        }
        if !(0.0 < sampler.min_size && sampler.min_size <= sampler.max_size) {
            return Err(TrackingError::InvalidConfig(format!(
                "sample sizes must satisfy 0 < min <= max, got min={}, max={}",
                sampler.min_size, sampler.max_size
            )));
        }
        if learning.negative_overlap > learning.positive_overlap {
            return Err(TrackingError::InvalidConfig(
                "negative overlap must not exceed positive overlap".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learning_active: true,
            calibration: CalibrationConfig::default(),
            separator: SeparatorConfig::default(),
            sampler: SamplerConfig::default(),
            extractor: ExtractorConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            policy: CalibrationPolicy::Fixed,
            high_probability: 0.95,
            low_probability: 0.05,
            mean_positive_score: 1.01,
            mean_negative_score: -1.01,
        }
    }
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            kind: SeparatorKind::Linear,
            regularization: 1e-3,
            radius: 1.0,
            min_positive_examples: 1,
            min_negative_examples: 1,
            max_examples_per_class: 200,
            patch_width: 10,
            patch_height: 10,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_count: 800,
            random_rate: 0.35,
            position_deviation: 0.15,
            size_deviation: 0.1,
            min_size: 20.0,
            max_size: 240.0,
            seed: None,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_total_weight: 0.0,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            positive_overlap: 0.7,
            negative_overlap: 0.3,
            max_positive_examples: 10,
            max_negative_examples: 10,
        }
    }
}

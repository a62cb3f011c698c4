//! Mapping of raw separator outputs to pseudo-probabilities.
//!
//! The mapping is the logistic function `p(x) = 1 / (1 + exp(a + b * x))`. Its two
//! parameters are chosen so that the mean output of positive examples maps to a
//! high probability and the mean output of negative examples maps to a low one.

use crate::{
    config::{CalibrationConfig, CalibrationPolicy},
    error::{Result, TrackingError},
};
use serde::{Deserialize, Serialize};

/// Parameters `a` and `b` of the logistic function `p(x) = 1 / (1 + exp(a + b * x))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParameters {
    pub a: f64,
    pub b: f64,
}

impl LogisticParameters {
    /// Solves for the parameters that map `mean_positive_score` to `high_probability`
    /// and `mean_negative_score` to `low_probability`.
    pub fn compute(
        mean_positive_score: f64,
        mean_negative_score: f64,
        high_probability: f64,
        low_probability: f64,
    ) -> Result<Self> {
        let inputs = [
            mean_positive_score,
            mean_negative_score,
            high_probability,
            low_probability,
        ];
        if inputs.iter().any(|value| !value.is_finite()) {
            return Err(TrackingError::InvalidCalibrationInput(format!(
                "non-finite input {inputs:?}"
            )));
        }
        if !(0.0 < low_probability && low_probability < high_probability && high_probability < 1.0)
        {
            return Err(TrackingError::InvalidCalibrationInput(format!(
                "probabilities must satisfy 0 < low < high < 1, got low={low_probability}, high={high_probability}"
            )));
        }
        if mean_positive_score == mean_negative_score {
            return Err(TrackingError::InvalidCalibrationInput(format!(
                "mean positive and negative scores are both {mean_positive_score}"
            )));
        }

        let rhs_positive = ((1.0 - high_probability) / high_probability).ln();
        let rhs_negative = ((1.0 - low_probability) / low_probability).ln();
        let b = (rhs_positive - rhs_negative) / (mean_positive_score - mean_negative_score);
        let a = rhs_positive - b * mean_positive_score;
        Ok(Self { a, b })
    }

    pub fn apply(&self, raw_score: f64) -> f64 {
        1.0 / (1.0 + (self.a + self.b * raw_score).exp())
    }
}

/// Logistic parameters together with the policy that decides whether they follow retraining.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// Computed once from assumed mean outputs; retraining is accepted and ignored.
    Fixed { parameters: LogisticParameters },
    /// Recomputed from the mean outputs of the latest training examples. The assumed
    /// negative mean stands in when a one-class separator was trained without negatives.
    Adaptive {
        parameters: LogisticParameters,
        high_probability: f64,
        low_probability: f64,
        mean_negative_score: f64,
    },
}

impl Calibration {
    pub fn fixed(
        high_probability: f64,
        low_probability: f64,
        mean_positive_score: f64,
        mean_negative_score: f64,
    ) -> Result<Self> {
        let parameters = LogisticParameters::compute(
            mean_positive_score,
            mean_negative_score,
            high_probability,
            low_probability,
        )?;
        Ok(Self::Fixed { parameters })
    }

    /// Adaptive calibration that uses the assumed mean outputs until the first retraining.
    pub fn adaptive(
        high_probability: f64,
        low_probability: f64,
        mean_positive_score: f64,
        mean_negative_score: f64,
    ) -> Result<Self> {
        let parameters = LogisticParameters::compute(
            mean_positive_score,
            mean_negative_score,
            high_probability,
            low_probability,
        )?;
        Ok(Self::Adaptive {
            parameters,
            high_probability,
            low_probability,
            mean_negative_score,
        })
    }

    pub fn from_config(config: &CalibrationConfig) -> Result<Self> {
        let CalibrationConfig {
            policy,
            high_probability,
            low_probability,
            mean_positive_score,
            mean_negative_score,
        } = *config;

        match policy {
            CalibrationPolicy::Fixed => Self::fixed(
                high_probability,
                low_probability,
                mean_positive_score,
                mean_negative_score,
            ),
            CalibrationPolicy::Adaptive => Self::adaptive(
                high_probability,
                low_probability,
                mean_positive_score,
                mean_negative_score,
            ),
        }
    }

    pub fn parameters(&self) -> LogisticParameters {
        match *self {
            Self::Fixed { parameters } => parameters,
            Self::Adaptive { parameters, .. } => parameters,
        }
    }

    pub fn policy(&self) -> CalibrationPolicy {
        match self {
            Self::Fixed { .. } => CalibrationPolicy::Fixed,
            Self::Adaptive { .. } => CalibrationPolicy::Adaptive,
        }
    }

    pub fn apply(&self, raw_score: f64) -> f64 {
        self.parameters().apply(raw_score)
    }

    /// Parameters to use after the separator was retrained and produced the given mean
    /// outputs on its positive and negative examples. `None` for the negative mean means
    /// the retraining had no negatives, so the assumed negative mean is used.
    ///
    /// Does not modify `self`, so a caller can discard the result if anything else
    /// about the retraining fails.
    pub fn recalibrated(
        &self,
        mean_positive_score: f64,
        mean_negative_score: Option<f64>,
    ) -> Result<LogisticParameters> {
        match *self {
            Self::Fixed { parameters } => Ok(parameters),
            Self::Adaptive {
                high_probability,
                low_probability,
                mean_negative_score: assumed_negative_score,
                ..
            } => LogisticParameters::compute(
                mean_positive_score,
                mean_negative_score.unwrap_or(assumed_negative_score),
                high_probability,
                low_probability,
            ),
        }
    }

    /// Replaces the parameters; a no-op for the fixed policy.
    pub fn set_parameters(&mut self, new_parameters: LogisticParameters) {
        if let Self::Adaptive { parameters, .. } = self {
            *parameters = new_parameters;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_parameters() {
        let calibration = Calibration::from_config(&CalibrationConfig::default()).unwrap();
        let LogisticParameters { a, b } = calibration.parameters();

        assert_abs_diff_eq!(a, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b, -2.0 * (0.95f64 / 0.05).ln() / 2.02, epsilon = 1e-12);
        assert_abs_diff_eq!(b, -2.915, epsilon = 1e-3);
        assert_abs_diff_eq!(calibration.apply(1.01), 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(calibration.apply(-1.01), 0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(calibration.apply(0.0), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn parameters_hit_target_probabilities() {
        let cases = [
            (1.01, -1.01, 0.95, 0.05),
            (3.0, 0.5, 0.8, 0.3),
            (-2.0, 4.0, 0.99, 0.01),
            (0.1, 0.0, 0.6, 0.4),
            (10.0, -0.25, 0.7, 0.2),
        ];
        for (mean_pos, mean_neg, high, low) in cases {
            let params = LogisticParameters::compute(mean_pos, mean_neg, high, low).unwrap();
            assert_abs_diff_eq!(params.apply(mean_pos), high, epsilon = 1e-9);
            assert_abs_diff_eq!(params.apply(mean_neg), low, epsilon = 1e-9);
        }
    }

    #[test]
    fn equal_means_are_rejected() {
        let result = LogisticParameters::compute(0.5, 0.5, 0.95, 0.05);
        assert!(matches!(
            result,
            Err(TrackingError::InvalidCalibrationInput(_))
        ));
        assert!(matches!(
            Calibration::fixed(0.95, 0.05, 1.0, 1.0),
            Err(TrackingError::InvalidCalibrationInput(_))
        ));
    }

    #[test]
    fn invalid_probabilities_are_rejected() {
        assert!(LogisticParameters::compute(1.0, -1.0, 0.05, 0.95).is_err());
        assert!(LogisticParameters::compute(1.0, -1.0, 1.0, 0.05).is_err());
        assert!(LogisticParameters::compute(1.0, -1.0, 0.95, 0.0).is_err());
        assert!(LogisticParameters::compute(f64::NAN, -1.0, 0.95, 0.05).is_err());
    }

    #[test]
    fn apply_is_monotone() {
        let increasing = LogisticParameters::compute(1.01, -1.01, 0.95, 0.05).unwrap();
        let decreasing = LogisticParameters::compute(-1.01, 1.01, 0.95, 0.05).unwrap();
        assert!(increasing.b < 0.0);
        assert!(decreasing.b > 0.0);

        let inputs: Vec<f64> = (-50..=50).map(|step| step as f64 * 0.1).collect();
        for pair in inputs.windows(2) {
            assert!(increasing.apply(pair[0]) <= increasing.apply(pair[1]));
            assert!(decreasing.apply(pair[0]) >= decreasing.apply(pair[1]));
        }
    }

    #[test]
    fn fixed_parameters_are_reproducible() {
        let first = Calibration::fixed(0.95, 0.05, 1.01, -1.01).unwrap();
        let second = Calibration::fixed(0.95, 0.05, 1.01, -1.01).unwrap();
        let (lhs, rhs) = (first.parameters(), second.parameters());
        assert_eq!(lhs.a.to_bits(), rhs.a.to_bits());
        assert_eq!(lhs.b.to_bits(), rhs.b.to_bits());
    }

    #[test]
    fn fixed_policy_ignores_retraining() {
        let mut calibration = Calibration::fixed(0.95, 0.05, 1.01, -1.01).unwrap();
        let before = calibration.parameters();
        let after = calibration.recalibrated(5.0, Some(2.0)).unwrap();
        assert_eq!(before, after);

        calibration.set_parameters(LogisticParameters { a: 1.0, b: 1.0 });
        assert_eq!(calibration.parameters(), before);
    }

    #[test]
    fn adaptive_policy_follows_retraining() {
        let mut calibration = Calibration::adaptive(0.9, 0.1, 1.01, -1.01).unwrap();
        let parameters = calibration.recalibrated(2.0, Some(0.0)).unwrap();
        calibration.set_parameters(parameters);

        assert_abs_diff_eq!(calibration.apply(2.0), 0.9, epsilon = 1e-9);
        assert_abs_diff_eq!(calibration.apply(0.0), 0.1, epsilon = 1e-9);
        assert!(calibration.recalibrated(1.0, Some(1.0)).is_err());
    }

    #[test]
    fn adaptive_policy_assumes_negative_mean_without_negatives() {
        let calibration = Calibration::adaptive(0.95, 0.05, 1.01, -1.01).unwrap();
        assert_eq!(calibration.policy(), CalibrationPolicy::Adaptive);

        let parameters = calibration.recalibrated(0.5, None).unwrap();

        assert_abs_diff_eq!(parameters.apply(0.5), 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(parameters.apply(-1.01), 0.05, epsilon = 1e-9);
    }
}

use crate::{
    config::LearningConfig,
    object::{Rectangle, Sample},
};
use itertools::Itertools;
use noisy_float::prelude::r64;
use std::cmp::Reverse;

/// New training examples selected by a [LearningStrategy].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrainRequest {
    pub positives: Vec<Sample>,
    pub negatives: Vec<Sample>,
}

/// Decides which samples become training examples and when the measurement model is
/// retrained.
pub trait LearningStrategy: Send {
    /// Called once per processed frame with the scored samples and the extracted
    /// position, if any.
    fn on_frame_processed(
        &mut self,
        samples: &[Sample],
        position: Option<&Rectangle>,
    ) -> Option<RetrainRequest>;
}

/// Labels samples by their overlap with the extracted position.
///
/// Positives are the position itself and the heaviest samples that overlap it strongly.
/// Negatives are the heaviest samples that barely overlap it, i.e. the background the
/// model currently confuses with the object the most. Nothing is learned while the
/// object is not found.
#[derive(Clone, Debug)]
pub struct PositionDependentLearningStrategy {
    config: LearningConfig,
}

impl PositionDependentLearningStrategy {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl LearningStrategy for PositionDependentLearningStrategy {
    fn on_frame_processed(
        &mut self,
        samples: &[Sample],
        position: Option<&Rectangle>,
    ) -> Option<RetrainRequest> {
        let position = position?;
        let LearningConfig {
            positive_overlap,
            negative_overlap,
            max_positive_examples,
            max_negative_examples,
        } = self.config;

        let by_weight = samples
            .iter()
            .map(|sample| (sample, sample.bounds().overlap(position)))
            .sorted_by_key(|(sample, _)| Reverse(r64(sample.weight)))
            .collect_vec();

        let positives = std::iter::once(Sample::from_bounds(position))
            .chain(
                by_weight
                    .iter()
                    .filter(|&&(_, overlap)| overlap >= positive_overlap)
                    .map(|&(sample, _)| *sample),
            )
            .take(max_positive_examples)
            .collect_vec();
        let negatives = by_weight
            .iter()
            .filter(|&&(_, overlap)| overlap <= negative_overlap)
            .map(|&(sample, _)| *sample)
            .take(max_negative_examples)
            .collect_vec();

        if positives.is_empty() || negatives.is_empty() {
            return None;
        }
        Some(RetrainRequest {
            positives,
            negatives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted(x: f64, y: f64, size: f64, weight: f64) -> Sample {
        Sample {
            weight,
            ..Sample::new(x, y, size)
        }
    }

    #[test]
    fn labels_by_overlap_and_weight() {
        let mut strategy = PositionDependentLearningStrategy::new(&LearningConfig {
            positive_overlap: 0.7,
            negative_overlap: 0.3,
            max_positive_examples: 2,
            max_negative_examples: 2,
        });
        let position = Rectangle::from_center(50.0, 50.0, 20.0, 20.0);
        let samples = [
            weighted(51.0, 50.0, 20.0, 0.6),
            weighted(50.0, 51.0, 20.0, 0.9),
            weighted(58.0, 50.0, 20.0, 0.8),
            weighted(10.0, 10.0, 20.0, 0.2),
            weighted(90.0, 90.0, 20.0, 0.7),
            weighted(10.0, 90.0, 20.0, 0.5),
        ];

        let request = strategy
            .on_frame_processed(&samples, Some(&position))
            .unwrap();

        assert_eq!(
            request.positives,
            vec![Sample::new(50.0, 50.0, 20.0), samples[1]]
        );
        assert_eq!(request.negatives, vec![samples[4], samples[5]]);
    }

    #[test]
    fn nothing_is_learned_without_a_position() {
        let mut strategy = PositionDependentLearningStrategy::new(&LearningConfig::default());
        let samples = [weighted(10.0, 10.0, 20.0, 0.2)];
        assert_eq!(strategy.on_frame_processed(&samples, None), None);
    }

    #[test]
    fn nothing_is_learned_without_background() {
        let mut strategy = PositionDependentLearningStrategy::new(&LearningConfig::default());
        let position = Rectangle::from_center(50.0, 50.0, 20.0, 20.0);
        let samples = [weighted(50.0, 50.0, 20.0, 0.9)];
        assert_eq!(strategy.on_frame_processed(&samples, Some(&position)), None);
    }
}

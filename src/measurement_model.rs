//! Measurement models assign each sample the probability of showing the tracked object.

use crate::{
    calibration::{Calibration, LogisticParameters},
    config::{Config, SeparatorConfig},
    error::{Result, TrackingError},
    image::{FeatureExtractor, Frame, PatchFeatureExtractor},
    object::Sample,
    separator::{ReferenceSeparator, TrainableSeparator},
};
use nalgebra::DVector;
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

/// Probability reported while there is neither a trained separator nor a fallback model.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

pub trait MeasurementModel: Send + Sync {
    /// Probability in `[0, 1]` that the sample shows the tracked object. Must not mutate
    /// any state, as samples are scored concurrently.
    fn score(&self, frame: &Frame, sample: &Sample) -> f64;
}

/// Measurement model whose appearance model is adapted while tracking.
pub trait LearningMeasurementModel: MeasurementModel {
    /// Adapts the model to new examples. On error the model is left exactly as it was.
    fn retrain(&mut self, frame: &Frame, positives: &[Sample], negatives: &[Sample])
        -> Result<()>;

    /// Forgets everything learned so far.
    fn reset(&mut self);

    fn is_trained(&self) -> bool;
}

/// Scores samples with a trainable separator whose output is calibrated to a probability.
pub struct DiscriminativeMeasurementModel<S = ReferenceSeparator> {
    extractor: Arc<dyn FeatureExtractor>,
    separator: S,
    calibration: Calibration,
    initial_calibration: Calibration,
    fallback: Option<Arc<dyn MeasurementModel>>,
    positive_examples: VecDeque<DVector<f64>>,
    negative_examples: VecDeque<DVector<f64>>,
    min_positive_examples: usize,
    min_negative_examples: usize,
    max_examples_per_class: usize,
}

impl DiscriminativeMeasurementModel<ReferenceSeparator> {
    /// Builds the model with a patch descriptor and the configured reference separator.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let Config {
            calibration,
            separator,
            ..
        } = config;

        let extractor = Arc::new(PatchFeatureExtractor::new(
            separator.patch_width,
            separator.patch_height,
        ));
        let calibration = Calibration::from_config(calibration)?;
        Ok(Self::new(
            extractor,
            ReferenceSeparator::from_config(separator),
            calibration,
            separator,
        ))
    }
}

impl<S> DiscriminativeMeasurementModel<S>
where
    S: TrainableSeparator + Clone,
{
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        separator: S,
        calibration: Calibration,
        config: &SeparatorConfig,
    ) -> Self {
        let SeparatorConfig {
            min_positive_examples,
            min_negative_examples,
            max_examples_per_class,
            ..
        } = *config;

        Self {
            extractor,
            separator,
            initial_calibration: calibration.clone(),
            calibration,
            fallback: None,
            positive_examples: VecDeque::new(),
            negative_examples: VecDeque::new(),
            min_positive_examples,
            min_negative_examples,
            max_examples_per_class,
        }
    }

    /// Model used to score samples while the separator has no decision function.
    pub fn with_fallback(mut self, fallback: Arc<dyn MeasurementModel>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn logistic_parameters(&self) -> LogisticParameters {
        self.calibration.parameters()
    }

    /// Number of remembered positive and negative examples.
    pub fn example_counts(&self) -> (usize, usize) {
        (self.positive_examples.len(), self.negative_examples.len())
    }

    fn extract_all(&self, frame: &Frame, samples: &[Sample]) -> Vec<DVector<f64>> {
        samples
            .iter()
            .filter_map(|sample| self.extractor.extract(frame, &sample.bounds()))
            .collect()
    }

    fn remember(
        &self,
        memory: &VecDeque<DVector<f64>>,
        new_examples: &[DVector<f64>],
    ) -> VecDeque<DVector<f64>> {
        let mut memory = memory.clone();
        memory.extend(new_examples.iter().cloned());
        while memory.len() > self.max_examples_per_class {
            memory.pop_front();
        }
        memory
    }

    fn mean_decision_value(separator: &S, examples: &[DVector<f64>]) -> Result<f64> {
        let values: Vec<f64> = examples
            .iter()
            .filter_map(|example| separator.decision_value(example))
            .collect();
        if values.is_empty() {
            return Err(TrackingError::RetrainFailed(
                "separator yields no output for its training examples".into(),
            ));
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl<S> MeasurementModel for DiscriminativeMeasurementModel<S>
where
    S: TrainableSeparator + Clone,
{
    fn score(&self, frame: &Frame, sample: &Sample) -> f64 {
        let Some(descriptor) = self.extractor.extract(frame, &sample.bounds()) else {
            return 0.0;
        };
        match self.separator.decision_value(&descriptor) {
            Some(value) => self.calibration.apply(value),
            None => match &self.fallback {
                Some(fallback) => fallback.score(frame, sample),
                None => NEUTRAL_PROBABILITY,
            },
        }
    }
}

impl<S> LearningMeasurementModel for DiscriminativeMeasurementModel<S>
where
    S: TrainableSeparator + Clone,
{
    fn retrain(
        &mut self,
        frame: &Frame,
        positives: &[Sample],
        negatives: &[Sample],
    ) -> Result<()> {
        let positives = self.extract_all(frame, positives);
        let negatives = self.extract_all(frame, negatives);
        if positives.len() < self.min_positive_examples
            || negatives.len() < self.min_negative_examples
        {
            return Err(TrackingError::RetrainFailed(format!(
                "got {} positive and {} negative examples, need at least {} and {}",
                positives.len(),
                negatives.len(),
                self.min_positive_examples,
                self.min_negative_examples
            )));
        }

        // Everything is computed on copies and only committed once nothing can fail anymore
        let mut positive_examples = self.remember(&self.positive_examples, &positives);
        let mut negative_examples = self.remember(&self.negative_examples, &negatives);
        let mut separator = self.separator.clone();
        separator.train(
            positive_examples.make_contiguous(),
            negative_examples.make_contiguous(),
        )?;

        let mean_positive = Self::mean_decision_value(&separator, &positives)?;
        let mean_negative = if negatives.is_empty() {
            None
        } else {
            Some(Self::mean_decision_value(&separator, &negatives)?)
        };
        let parameters = self
            .calibration
            .recalibrated(mean_positive, mean_negative)
            .map_err(|err| TrackingError::RetrainFailed(err.to_string()))?;

        debug!(
            positives = positives.len(),
            negatives = negatives.len(),
            mean_positive,
            mean_negative = ?mean_negative,
            policy = ?self.calibration.policy(),
            a = parameters.a,
            b = parameters.b,
            "retrained measurement model"
        );

        self.separator = separator;
        self.positive_examples = positive_examples;
        self.negative_examples = negative_examples;
        self.calibration.set_parameters(parameters);
        Ok(())
    }

    fn reset(&mut self) {
        self.separator.reset();
        self.calibration = self.initial_calibration.clone();
        self.positive_examples.clear();
        self.negative_examples.clear();
    }

    fn is_trained(&self) -> bool {
        self.separator.is_trained()
    }
}

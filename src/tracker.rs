use crate::{
    config::Config,
    error::{Result, TrackingError},
    extractor::{PositionExtractor, WeightedMeanPositionExtractor},
    image::Frame,
    learning::{LearningStrategy, PositionDependentLearningStrategy, RetrainRequest},
    measurement_model::{
        DiscriminativeMeasurementModel, LearningMeasurementModel, MeasurementModel,
    },
    object::{Rectangle, Sample},
    sampler::{ResamplingSampler, Sampler},
};
use nalgebra::Vector3;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::{mem, sync::Arc};
use tracing::{debug, info, warn};

pub type SharedSampler = Arc<Mutex<dyn Sampler>>;
pub type SharedMeasurementModel = Arc<RwLock<dyn LearningMeasurementModel>>;
pub type SharedLearningStrategy = Arc<Mutex<dyn LearningStrategy>>;

/// Whether the tracker has seen a frame yet and whether the object was found in the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Uninitialized,
    Found,
    Lost,
}

/// Condensation tracker that learns the appearance of the tracked object over time.
pub struct LearningCondensationTracker {
    /// The current samples.
    samples: Vec<Sample>,
    /// The samples of the previous frame; its buffer is reused for the next generation.
    old_samples: Vec<Sample>,
    /// The last accepted position, cleared when the object is lost.
    position: Option<Rectangle>,
    /// Movement of the object between the last two accepted positions.
    offset: Vector3<f64>,
    state: TrackingState,
    learning_active: bool,
    sampler: SharedSampler,
    measurement_model: SharedMeasurementModel,
    extractor: Arc<dyn PositionExtractor>,
    learning_strategy: SharedLearningStrategy,
}

impl LearningCondensationTracker {
    pub fn new(
        sampler: SharedSampler,
        measurement_model: SharedMeasurementModel,
        extractor: Arc<dyn PositionExtractor>,
        learning_strategy: SharedLearningStrategy,
    ) -> Self {
        Self {
            samples: vec![],
            old_samples: vec![],
            position: None,
            offset: Vector3::zeros(),
            state: TrackingState::Uninitialized,
            learning_active: true,
            sampler,
            measurement_model,
            extractor,
            learning_strategy,
        }
    }

    /// This is the function to build a tracker from the reference collaborators.
    ///
    /// Example:
    ///
    /// ```rust
    /// use condensation_tracking::config::Config;
    /// use condensation_tracking::image::Frame;
    /// use condensation_tracking::LearningCondensationTracker;
    ///
    /// let mut config = Config::default();
    /// config.sampler.sample_count = 100;
    /// config.sampler.seed = Some(7);
    /// let mut tracker = LearningCondensationTracker::from_config(&config)?;
    ///
    /// // Nothing has been learned yet, so no sample is believed to show the object
    /// let frame = Frame::from_fn(320, 240, |x, y| ((x ^ y) % 256) as f32);
    /// assert_eq!(tracker.process(&frame), None);
    /// assert_eq!(tracker.samples().len(), 100);
    /// # Ok::<(), condensation_tracking::error::TrackingError>(())
    /// ```
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let measurement_model = DiscriminativeMeasurementModel::from_config(config)?;

        let mut tracker = Self::new(
            Arc::new(Mutex::new(ResamplingSampler::new(&config.sampler))),
            Arc::new(RwLock::new(measurement_model)),
            Arc::new(WeightedMeanPositionExtractor::new(&config.extractor)),
            Arc::new(Mutex::new(PositionDependentLearningStrategy::new(
                &config.learning,
            ))),
        );
        tracker.learning_active = config.learning_active;
        Ok(tracker)
    }

    /// Processes the next frame and returns the most probable object position, if there is
    /// an object.
    pub fn process(&mut self, frame: &Frame) -> Option<Rectangle> {
        mem::swap(&mut self.samples, &mut self.old_samples);
        self.samples.clear();
        {
            let mut sampler = self.sampler.lock();
            if self.old_samples.is_empty() {
                sampler.initial(frame, &mut self.samples);
            } else {
                sampler.propagate(&self.old_samples, &self.offset, frame, &mut self.samples);
            }
        }

        if self.samples.is_empty() {
            warn!(error = %TrackingError::EmptySampleSet, "treating frame as object not found");
            self.lose();
            return None;
        }

        self.score_samples(frame);

        let position = self.extractor.extract(&self.samples);
        match position {
            Some(position) => self.find(position),
            None => self.lose(),
        }
        debug!(
            samples = self.samples.len(),
            state = ?self.state,
            position = ?position,
            "processed frame"
        );

        if self.learning_active {
            self.learn(frame, position.as_ref());
        }

        position
    }

    /// Trains the measurement model on a known object position and starts tracking from it.
    ///
    /// Background examples are taken from a cold-start sample set. Fails with
    /// [TrackingError::RetrainFailed] if no examples could be selected or learned, in
    /// which case the tracker is unchanged.
    pub fn initialize(&mut self, frame: &Frame, position: Rectangle) -> Result<()> {
        let mut samples = mem::take(&mut self.old_samples);
        samples.clear();
        self.sampler.lock().initial(frame, &mut samples);

        let request = self
            .learning_strategy
            .lock()
            .on_frame_processed(&samples, Some(&position));
        let result = match request {
            Some(RetrainRequest {
                positives,
                negatives,
            }) => self
                .measurement_model
                .write()
                .retrain(frame, &positives, &negatives),
            None => Err(TrackingError::RetrainFailed(
                "no training examples around the initial position".into(),
            )),
        };
        if let Err(err) = result {
            samples.clear();
            self.old_samples = samples;
            return Err(err);
        }

        self.old_samples = mem::replace(&mut self.samples, samples);
        self.score_samples(frame);
        self.position = Some(position);
        self.state = TrackingState::Found;
        info!(position = ?position, "initialized tracking");
        Ok(())
    }

    fn score_samples(&mut self, frame: &Frame) {
        let guard = self.measurement_model.read();
        let model: &dyn LearningMeasurementModel = &*guard;
        self.samples.par_iter_mut().for_each(|sample| {
            let probability = model.score(frame, sample);
            sample.weight = probability;
            sample.object = probability > 0.5;
        });
    }

    fn find(&mut self, position: Rectangle) {
        if let Some(previous) = self.position {
            self.offset = position.state() - previous.state();
        }
        self.position = Some(position);
        self.state = TrackingState::Found;
    }

    fn lose(&mut self) {
        self.position = None;
        self.state = TrackingState::Lost;
    }

    fn learn(&mut self, frame: &Frame, position: Option<&Rectangle>) {
        let request = self
            .learning_strategy
            .lock()
            .on_frame_processed(&self.samples, position);
        let Some(RetrainRequest {
            positives,
            negatives,
        }) = request
        else {
            return;
        };

        let result = self
            .measurement_model
            .write()
            .retrain(frame, &positives, &negatives);
        match result {
            Ok(()) => debug!(
                positives = positives.len(),
                negatives = negatives.len(),
                "adapted measurement model"
            ),
            Err(err) => warn!(error = %err, "keeping previous measurement model"),
        }
    }

    /// The current samples.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sampler(&self) -> SharedSampler {
        self.sampler.clone()
    }

    pub fn set_sampler(&mut self, sampler: SharedSampler) {
        self.sampler = sampler;
    }

    pub fn measurement_model(&self) -> SharedMeasurementModel {
        self.measurement_model.clone()
    }

    pub fn is_learning_active(&self) -> bool {
        self.learning_active
    }

    /// Enables or disables learning. Disabling also resets the measurement model, so
    /// everything learned so far is discarded.
    pub fn set_learning_active(&mut self, active: bool) {
        if active != self.learning_active {
            info!(active, "changed learning activity");
        }
        self.learning_active = active;
        if !active {
            self.measurement_model.write().reset();
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn position(&self) -> Option<Rectangle> {
        self.position
    }

    /// Movement (`dx`, `dy`, `dsize`) of the object between the last two accepted positions.
    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }
}

use crate::{
    config::{SeparatorConfig, SeparatorKind},
    error::{Result, TrackingError},
};
use nalgebra::{DMatrix, DVector};

/// A decision function that can be refitted on labelled descriptors.
pub trait TrainableSeparator: Send + Sync {
    /// Refits the separator. On error the previous decision function stays in place.
    ///
    /// Two-class separators need examples of both classes. One-class separators learn
    /// from positives alone and may ignore negatives.
    fn train(&mut self, positives: &[DVector<f64>], negatives: &[DVector<f64>]) -> Result<()>;

    /// Raw, uncalibrated output. Positive examples score higher than negative ones.
    /// `None` while there is no decision function.
    fn decision_value(&self, descriptor: &DVector<f64>) -> Option<f64>;

    fn is_trained(&self) -> bool;

    /// Whether the separator can be trained without negative examples.
    fn is_one_class(&self) -> bool {
        false
    }

    /// Reverts to the decision function the separator was constructed with.
    fn reset(&mut self);
}

/// Linear separator `w * x + bias` fitted by ridge regression onto the targets +1 and -1.
#[derive(Clone, Debug)]
pub struct LinearSeparator {
    regularization: f64,
    /// Weights with the bias appended as last element.
    weights: Option<DVector<f64>>,
    initial_weights: Option<DVector<f64>>,
}

impl LinearSeparator {
    pub fn new(regularization: f64) -> Self {
        Self {
            regularization,
            weights: None,
            initial_weights: None,
        }
    }

    /// Separator that starts with (and resets to) the given decision function.
    pub fn with_weights(regularization: f64, weights: DVector<f64>, bias: f64) -> Self {
        let augmented = weights.push(bias);
        Self {
            regularization,
            weights: Some(augmented.clone()),
            initial_weights: Some(augmented),
        }
    }

    pub fn weights(&self) -> Option<&DVector<f64>> {
        self.weights.as_ref()
    }

    fn solve(&self, positives: &[DVector<f64>], negatives: &[DVector<f64>]) -> Result<DVector<f64>> {
        let dimension = positives[0].len();
        let examples = positives.iter().chain(negatives);
        if examples.clone().any(|example| example.len() != dimension) {
            return Err(TrackingError::RetrainFailed(
                "examples differ in dimension".into(),
            ));
        }

        let rows = positives.len() + negatives.len();
        let mut design = DMatrix::from_element(rows, dimension + 1, 1.0);
        for (row, example) in examples.enumerate() {
            design
                .view_mut((row, 0), (1, dimension))
                .copy_from(&example.transpose());
        }
        let targets = DVector::from_fn(rows, |row, _| {
            if row < positives.len() {
                1.0
            } else {
                -1.0
            }
        });

        let gram = design.transpose() * &design
            + DMatrix::identity(dimension + 1, dimension + 1) * self.regularization;
        let rhs = design.transpose() * targets;
        let cholesky = gram.cholesky().ok_or_else(|| {
            TrackingError::RetrainFailed("normal equations are not positive definite".into())
        })?;
        let weights = cholesky.solve(&rhs);

        if weights.iter().any(|weight| !weight.is_finite()) {
            return Err(TrackingError::RetrainFailed(
                "least squares solution is not finite".into(),
            ));
        }
        Ok(weights)
    }
}

impl TrainableSeparator for LinearSeparator {
    fn train(&mut self, positives: &[DVector<f64>], negatives: &[DVector<f64>]) -> Result<()> {
        if positives.is_empty() || negatives.is_empty() {
            return Err(TrackingError::RetrainFailed(format!(
                "need examples of both classes, got {} positive and {} negative",
                positives.len(),
                negatives.len()
            )));
        }
        let weights = self.solve(positives, negatives)?;
        self.weights = Some(weights);
        Ok(())
    }

    fn decision_value(&self, descriptor: &DVector<f64>) -> Option<f64> {
        let weights = self.weights.as_ref()?;
        let dimension = weights.len() - 1;
        if descriptor.len() != dimension {
            return None;
        }
        let value = weights.rows(0, dimension).dot(descriptor) + weights[dimension];
        Some(value)
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }

    fn reset(&mut self) {
        self.weights = self.initial_weights.clone();
    }
}

/// One-class separator scoring descriptors by their distance to the mean positive example.
///
/// The decision value is `radius - |x - centroid|`, so descriptors within `radius` of the
/// centroid score positive.
#[derive(Clone, Debug)]
pub struct CentroidSeparator {
    radius: f64,
    centroid: Option<DVector<f64>>,
}

impl CentroidSeparator {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            centroid: None,
        }
    }

    pub fn centroid(&self) -> Option<&DVector<f64>> {
        self.centroid.as_ref()
    }
}

impl TrainableSeparator for CentroidSeparator {
    fn train(&mut self, positives: &[DVector<f64>], _negatives: &[DVector<f64>]) -> Result<()> {
        let Some(first) = positives.first() else {
            return Err(TrackingError::RetrainFailed(
                "need at least one positive example".into(),
            ));
        };
        let dimension = first.len();
        if positives.iter().any(|example| example.len() != dimension) {
            return Err(TrackingError::RetrainFailed(
                "examples differ in dimension".into(),
            ));
        }

        let sum = positives
            .iter()
            .fold(DVector::zeros(dimension), |sum, example| sum + example);
        let centroid = sum / positives.len() as f64;
        if centroid.iter().any(|value| !value.is_finite()) {
            return Err(TrackingError::RetrainFailed(
                "centroid is not finite".into(),
            ));
        }
        self.centroid = Some(centroid);
        Ok(())
    }

    fn decision_value(&self, descriptor: &DVector<f64>) -> Option<f64> {
        let centroid = self.centroid.as_ref()?;
        if descriptor.len() != centroid.len() {
            return None;
        }
        Some(self.radius - (descriptor - centroid).norm())
    }

    fn is_trained(&self) -> bool {
        self.centroid.is_some()
    }

    fn is_one_class(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.centroid = None;
    }
}

/// The separators that can be selected through [SeparatorConfig].
#[derive(Clone, Debug)]
pub enum ReferenceSeparator {
    Linear(LinearSeparator),
    Centroid(CentroidSeparator),
}

impl ReferenceSeparator {
    pub fn from_config(config: &SeparatorConfig) -> Self {
        match config.kind {
            SeparatorKind::Linear => Self::Linear(LinearSeparator::new(config.regularization)),
            SeparatorKind::Centroid => Self::Centroid(CentroidSeparator::new(config.radius)),
        }
    }
}

impl TrainableSeparator for ReferenceSeparator {
    fn train(&mut self, positives: &[DVector<f64>], negatives: &[DVector<f64>]) -> Result<()> {
        match self {
            Self::Linear(separator) => separator.train(positives, negatives),
            Self::Centroid(separator) => separator.train(positives, negatives),
        }
    }

    fn decision_value(&self, descriptor: &DVector<f64>) -> Option<f64> {
        match self {
            Self::Linear(separator) => separator.decision_value(descriptor),
            Self::Centroid(separator) => separator.decision_value(descriptor),
        }
    }

    fn is_trained(&self) -> bool {
        match self {
            Self::Linear(separator) => separator.is_trained(),
            Self::Centroid(separator) => separator.is_trained(),
        }
    }

    fn is_one_class(&self) -> bool {
        match self {
            Self::Linear(separator) => separator.is_one_class(),
            Self::Centroid(separator) => separator.is_one_class(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Linear(separator) => separator.reset(),
            Self::Centroid(separator) => separator.reset(),
        }
    }
}

use crate::{
    config::ExtractorConfig,
    object::{Rectangle, Sample},
};

/// Reduces a scored sample set to a single object position.
pub trait PositionExtractor: Send + Sync {
    /// Returns `None` if the samples do not indicate an object.
    fn extract(&self, samples: &[Sample]) -> Option<Rectangle>;
}

/// Weighted mean of all samples that were classified as showing the object.
#[derive(Clone, Debug, Default)]
pub struct WeightedMeanPositionExtractor {
    min_total_weight: f64,
}

impl WeightedMeanPositionExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            min_total_weight: config.min_total_weight,
        }
    }
}

impl PositionExtractor for WeightedMeanPositionExtractor {
    fn extract(&self, samples: &[Sample]) -> Option<Rectangle> {
        let (total_weight, x, y, size) = samples
            .iter()
            .filter(|sample| sample.object)
            .fold((0.0, 0.0, 0.0, 0.0), |(weight, x, y, size), sample| {
                (
                    weight + sample.weight,
                    x + sample.weight * sample.x,
                    y + sample.weight * sample.y,
                    size + sample.weight * sample.size,
                )
            });

        if !(total_weight > 0.0) || total_weight < self.min_total_weight {
            return None;
        }
        let size = size / total_weight;
        Some(Rectangle::from_center(
            x / total_weight,
            y / total_weight,
            size,
            size,
        ))
    }
}

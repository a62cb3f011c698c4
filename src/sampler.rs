use crate::{config::SamplerConfig, image::Frame, object::Sample};
use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Proposes the sample set of the next time step.
///
/// Implementations write into `samples`, which the tracker clears beforehand and
/// reuses across frames.
pub trait Sampler: Send {
    /// Samples without any prior knowledge about the object.
    fn initial(&mut self, frame: &Frame, samples: &mut Vec<Sample>);

    /// Samples conditioned on the weighted samples of the previous time step and the
    /// last movement of the object (`dx`, `dy`, `dsize`).
    fn propagate(
        &mut self,
        previous: &[Sample],
        offset: &Vector3<f64>,
        frame: &Frame,
        samples: &mut Vec<Sample>,
    );
}

/// Resamples the previous generation proportional to its weights, moves every sample by
/// the movement offset and diffuses it with gaussian noise. A fraction of each generation
/// is drawn uniformly over the frame so the object can be recovered after losing it.
pub struct ResamplingSampler {
    config: SamplerConfig,
    rng: StdRng,
}

impl ResamplingSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config: config.clone(),
            rng,
        }
    }

    /// Size range that fits into the frame, or `None` if the frame is too small.
    fn size_range(&self, frame: &Frame) -> Option<(f64, f64)> {
        let max_size = self
            .config
            .max_size
            .min(frame.width() as f64)
            .min(frame.height() as f64);
        (self.config.min_size <= max_size).then_some((self.config.min_size, max_size))
    }

    fn random_sample(&mut self, frame: &Frame, (min_size, max_size): (f64, f64)) -> Sample {
        let size = self.rng.random_range(min_size..=max_size);
        let half = size / 2.0;
        let x = self.rng.random_range(half..=frame.width() as f64 - half);
        let y = self.rng.random_range(half..=frame.height() as f64 - half);
        Sample::new(x, y, size)
    }

    fn diffuse(
        &mut self,
        sample: &Sample,
        offset: &Vector3<f64>,
        frame: &Frame,
        (min_size, max_size): (f64, f64),
    ) -> Sample {
        let position_deviation = self.config.position_deviation * sample.size;
        let size_deviation = self.config.size_deviation * sample.size;
        let noise_x: f64 = self.rng.sample(StandardNormal);
        let noise_y: f64 = self.rng.sample(StandardNormal);
        let noise_size: f64 = self.rng.sample(StandardNormal);

        let size = (sample.size + offset.z + size_deviation * noise_size).clamp(min_size, max_size);
        let half = size / 2.0;
        let x = (sample.x + offset.x + position_deviation * noise_x)
            .clamp(half, frame.width() as f64 - half);
        let y = (sample.y + offset.y + position_deviation * noise_y)
            .clamp(half, frame.height() as f64 - half);
        Sample::new(x, y, size)
    }
}

impl Sampler for ResamplingSampler {
    fn initial(&mut self, frame: &Frame, samples: &mut Vec<Sample>) {
        let Some(size_range) = self.size_range(frame) else {
            return;
        };
        for _ in 0..self.config.sample_count {
            let sample = self.random_sample(frame, size_range);
            samples.push(sample);
        }
    }

    fn propagate(
        &mut self,
        previous: &[Sample],
        offset: &Vector3<f64>,
        frame: &Frame,
        samples: &mut Vec<Sample>,
    ) {
        let Some(size_range) = self.size_range(frame) else {
            return;
        };
        let count = self.config.sample_count;
        let total_weight: f64 = previous.iter().map(|sample| sample.weight).sum();
        let resample_count = if total_weight > 0.0 {
            count - (self.config.random_rate * count as f64).round() as usize
        } else {
            0
        };

        // Systematic resampling: one random start, then equidistant pointers into the
        // cumulative weights
        if resample_count > 0 {
            let step = total_weight / resample_count as f64;
            let mut pointer = self.rng.random_range(0.0..step);
            let mut cumulative = 0.0;
            let mut candidates = previous.iter();
            let mut current = None;
            for _ in 0..resample_count {
                while cumulative <= pointer {
                    match candidates.next() {
                        Some(candidate) => {
                            cumulative += candidate.weight;
                            current = Some(candidate);
                        }
                        None => break,
                    }
                }
                let Some(parent) = current else {
                    break;
                };
                let sample = self.diffuse(parent, offset, frame, size_range);
                samples.push(sample);
                pointer += step;
            }
        }

        while samples.len() < count {
            let sample = self.random_sample(frame, size_range);
            samples.push(sample);
        }
    }
}

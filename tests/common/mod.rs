use condensation_tracking::{image::Frame, sampler::Sampler, Sample};
use nalgebra::Vector3;
use noisy_float::prelude::r64;

pub const FRAME_WIDTH: usize = 160;
pub const FRAME_HEIGHT: usize = 100;
pub const OBJECT_SIZE: f64 = 24.0;

/// Faintly striped background with a gaussian blob centered at `(center_x, center_y)`.
pub fn scene(center_x: f64, center_y: f64) -> Frame {
    Frame::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        let (x, y) = (x as f64, y as f64);
        let background = ((x * 0.7).sin() + (y * 1.1).cos()) * 0.5 + 100.0;
        let distance_sq = (x - center_x).powi(2) + (y - center_y).powi(2);
        let blob = 120.0 * (-distance_sq / (2.0 * 6.0 * 6.0)).exp();
        (background + blob) as f32
    })
}

/// Deterministic sampler: a coarse grid over the frame for cold starts, a fine grid
/// around the heaviest previous sample otherwise.
pub struct GridSampler;

impl Sampler for GridSampler {
    fn initial(&mut self, frame: &Frame, samples: &mut Vec<Sample>) {
        let half = OBJECT_SIZE / 2.0;
        let mut y = half;
        while y + half <= frame.height() as f64 {
            let mut x = half;
            while x + half <= frame.width() as f64 {
                samples.push(Sample::new(x, y, OBJECT_SIZE));
                x += 8.0;
            }
            y += 8.0;
        }
    }

    fn propagate(
        &mut self,
        previous: &[Sample],
        _offset: &Vector3<f64>,
        frame: &Frame,
        samples: &mut Vec<Sample>,
    ) {
        let Some(anchor) = previous.iter().max_by_key(|sample| r64(sample.weight)) else {
            return;
        };
        let half = OBJECT_SIZE / 2.0;
        for dy in (-6..=6).step_by(2) {
            for dx in (-6..=6).step_by(2) {
                let x = (anchor.x + dx as f64).clamp(half, frame.width() as f64 - half);
                let y = (anchor.y + dy as f64).clamp(half, frame.height() as f64 - half);
                samples.push(Sample::new(x, y, OBJECT_SIZE));
            }
        }
    }
}

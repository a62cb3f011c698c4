use crate::object::Rectangle;
use nalgebra::{DMatrix, DVector};

/// A grayscale frame. Rows are image rows, so the matrix is `height x width`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pixels: DMatrix<f32>,
}

impl Frame {
    pub fn new(pixels: DMatrix<f32>) -> Self {
        Self { pixels }
    }

    /// Builds a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        Self::new(DMatrix::from_fn(height, width, |row, col| f(col, row)))
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn pixel(&self, x: usize, y: usize) -> f32 {
        self.pixels[(y, x)]
    }

    /// Whether the region lies completely inside the frame.
    pub fn contains(&self, region: &Rectangle) -> bool {
        region.width > 0.0
            && region.height > 0.0
            && region.x >= 0.0
            && region.y >= 0.0
            && region.x + region.width <= self.width() as f64
            && region.y + region.height <= self.height() as f64
    }
}

/// Turns the image content of a region into an appearance descriptor.
pub trait FeatureExtractor: Send + Sync {
    /// Returns `None` if no descriptor can be computed for the region, e.g. because it
    /// leaves the frame.
    fn extract(&self, frame: &Frame, region: &Rectangle) -> Option<DVector<f64>>;

    fn dimension(&self) -> usize;
}

/// Samples the region onto a fixed grid and normalizes the result to zero mean and
/// unit length, which makes the descriptor invariant to brightness and contrast.
#[derive(Clone, Debug)]
pub struct PatchFeatureExtractor {
    patch_width: usize,
    patch_height: usize,
}

impl PatchFeatureExtractor {
    pub fn new(patch_width: usize, patch_height: usize) -> Self {
        Self {
            patch_width,
            patch_height,
        }
    }
}

impl FeatureExtractor for PatchFeatureExtractor {
    fn extract(&self, frame: &Frame, region: &Rectangle) -> Option<DVector<f64>> {
        if !frame.contains(region) {
            return None;
        }

        let Self {
            patch_width,
            patch_height,
        } = *self;
        let step_x = region.width / patch_width as f64;
        let step_y = region.height / patch_height as f64;

        // Nearest neighbour at the center of each grid cell
        let mut patch = DVector::from_fn(self.dimension(), |index, _| {
            let (row, col) = (index / patch_width, index % patch_width);
            let x = (region.x + (col as f64 + 0.5) * step_x) as usize;
            let y = (region.y + (row as f64 + 0.5) * step_y) as usize;
            let x = x.min(frame.width() - 1);
            let y = y.min(frame.height() - 1);
            frame.pixel(x, y) as f64
        });

        let mean = patch.mean();
        patch.add_scalar_mut(-mean);
        let norm = patch.norm();
        if norm > f64::EPSILON {
            patch /= norm;
        }
        Some(patch)
    }

    fn dimension(&self) -> usize {
        self.patch_width * self.patch_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn gradient_frame() -> Frame {
        Frame::from_fn(40, 30, |x, y| (x + 2 * y) as f32)
    }

    #[test]
    fn frame_dimensions() {
        let frame = gradient_frame();
        assert_eq!(frame.width(), 40);
        assert_eq!(frame.height(), 30);
        assert_eq!(frame.pixel(3, 2), 7.0);
        assert!(frame.contains(&Rectangle::new(0.0, 0.0, 40.0, 30.0)));
        assert!(!frame.contains(&Rectangle::new(-1.0, 0.0, 10.0, 10.0)));
        assert!(!frame.contains(&Rectangle::new(35.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn descriptor_is_normalized() {
        let extractor = PatchFeatureExtractor::new(4, 4);
        let descriptor = extractor
            .extract(&gradient_frame(), &Rectangle::new(5.0, 5.0, 16.0, 16.0))
            .unwrap();

        assert_eq!(descriptor.len(), extractor.dimension());
        assert_abs_diff_eq!(descriptor.mean(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(descriptor.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn descriptor_ignores_brightness_and_contrast() {
        let extractor = PatchFeatureExtractor::new(5, 5);
        let region = Rectangle::new(2.0, 2.0, 20.0, 20.0);
        let frame = gradient_frame();
        let brighter = Frame::from_fn(40, 30, |x, y| 3.0 * frame.pixel(x, y) + 50.0);

        let lhs = extractor.extract(&frame, &region).unwrap();
        let rhs = extractor.extract(&brighter, &region).unwrap();
        assert_abs_diff_eq!((lhs - rhs).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn regions_outside_the_frame_have_no_descriptor() {
        let extractor = PatchFeatureExtractor::new(4, 4);
        let region = Rectangle::new(30.0, 20.0, 16.0, 16.0);
        assert!(extractor.extract(&gradient_frame(), &region).is_none());
    }
}

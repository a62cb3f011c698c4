use geo::{prelude::*, BooleanOps, Rect};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates, anchored at its top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A weighted hypothesis of the object state.
///
/// `x` and `y` are the center of a square region with side length `size`.
/// `object` is set while scoring and tells the learning strategy whether the
/// measurement model believes the sample shows the tracked object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub weight: f64,
    pub object: bool,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self {
            x: center_x - width / 2.0,
            y: center_y - height / 2.0,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Center and width, the quantities the movement offset is measured in.
    pub fn state(&self) -> Vector3<f64> {
        let center = self.center();
        Vector3::new(center.x, center.y, self.width)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn to_geo_rect(&self) -> Rect<f64> {
        Rect::new(
            (self.x, self.y),
            (self.x + self.width, self.y + self.height),
        )
    }

    /// Area shared by both rectangles.
    pub fn intersection(&self, other: &Rectangle) -> f64 {
        let (lhs, rhs) = (self.to_geo_rect(), other.to_geo_rect());
        if !lhs.intersects(&rhs) {
            return 0.0;
        }
        lhs.to_polygon()
            .intersection(&rhs.to_polygon())
            .unsigned_area()
    }

    /// Intersection over union.
    pub fn overlap(&self, other: &Rectangle) -> f64 {
        let intersec = self.intersection(other);
        let union = self.area() + other.area() - intersec;
        if union <= 0.0 {
            return 0.0;
        }
        intersec / union
    }
}

impl Sample {
    pub fn new(x: f64, y: f64, size: f64) -> Self {
        Self {
            x,
            y,
            size,
            weight: 1.0,
            object: false,
        }
    }

    /// Sample that covers exactly the given bounding box (using its width as size).
    pub fn from_bounds(bounds: &Rectangle) -> Self {
        let center = bounds.center();
        Self::new(center.x, center.y, bounds.width)
    }

    pub fn bounds(&self) -> Rectangle {
        Rectangle::from_center(self.x, self.y, self.size, self.size)
    }

    pub fn state(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn overlap_of_identical_rectangles_is_one() {
        let rect = Rectangle::new(5.0, 5.0, 10.0, 20.0);
        assert_abs_diff_eq!(rect.overlap(&rect), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn overlap_of_disjoint_rectangles_is_zero() {
        let lhs = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let rhs = Rectangle::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(lhs.intersection(&rhs), 0.0);
        assert_eq!(lhs.overlap(&rhs), 0.0);
    }

    #[test]
    fn overlap_of_half_shifted_squares() {
        let lhs = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let rhs = Rectangle::new(5.0, 0.0, 10.0, 10.0);
        assert_abs_diff_eq!(lhs.intersection(&rhs), 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lhs.overlap(&rhs), 50.0 / 150.0, epsilon = 1e-9);
    }

    #[test]
    fn sample_bounds_are_centered() {
        let sample = Sample::new(20.0, 30.0, 10.0);
        let bounds = sample.bounds();
        assert_eq!(bounds, Rectangle::new(15.0, 25.0, 10.0, 10.0));
        assert_eq!(Sample::from_bounds(&bounds).state(), sample.state());
    }

    #[test]
    fn contained_rectangle_overlaps_by_area_ratio() {
        let outer = Rectangle::new(0.0, 0.0, 20.0, 20.0);
        let inner = Rectangle::new(5.0, 5.0, 10.0, 10.0);
        assert_abs_diff_eq!(outer.intersection(&inner), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(inner.overlap(&outer), 0.25, epsilon = 1e-9);
    }
}

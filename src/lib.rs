pub mod calibration;
pub mod config;
pub mod error;
pub mod extractor;
pub mod image;
pub mod learning;
pub mod measurement_model;
pub mod object;
pub mod sampler;
pub mod separator;
pub mod tracker;

pub use error::TrackingError;
pub use object::{Rectangle, Sample};
pub use tracker::*;

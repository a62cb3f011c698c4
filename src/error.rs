use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("invalid calibration input: {0}")]
    InvalidCalibrationInput(String),
    #[error("retraining failed: {0}")]
    RetrainFailed(String),
    #[error("sampler returned an empty sample set")]
    EmptySampleSet,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TrackingError>;

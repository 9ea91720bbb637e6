//! Error types for speckle-core.

use thiserror::Error;

/// Result type alias for speckle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for segmentation and quantification.
#[derive(Error, Debug)]
pub enum Error {
    /// Automatic thresholding left no foreground voxels.
    #[error("threshold {threshold} leaves no foreground voxels")]
    DegenerateThreshold { threshold: f64 },

    /// Two volumes that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    /// A volume with zero voxels was supplied.
    #[error("volume has no voxels")]
    EmptyVolume,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

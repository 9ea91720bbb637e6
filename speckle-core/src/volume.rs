//! Dense volume containers and voxel spacing.
//!
//! All volumes are stored as `ndarray::Array3` with axis order
//! `(z, x, y)`, matching the order in which the microscope reports
//! its spacing.

use crate::{Error, Result};
use ndarray::Array3;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer label volume. `0` is background.
pub type LabelVolume = Array3<u32>;

/// Euclidean distance volume, zero on background.
pub type DistanceVolume = Array3<f64>;

/// Binary foreground mask.
pub type MaskVolume = Array3<bool>;

/// Physical size of one voxel along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spacing {
    /// Z-stack interval.
    pub z: f64,
    /// Size along the first in-plane axis.
    pub x: f64,
    /// Size along the second in-plane axis.
    pub y: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self::isotropic(1.0)
    }
}

impl Spacing {
    /// Creates a spacing triple.
    #[must_use]
    pub fn new(z: f64, x: f64, y: f64) -> Self {
        Self { z, x, y }
    }

    /// Creates a spacing with the same size on every axis.
    #[must_use]
    pub fn isotropic(size: f64) -> Self {
        Self::new(size, size, size)
    }

    /// Converts microscope spacing to per-voxel spacing by dividing by the
    /// pixel resolution of each axis.
    ///
    /// # Errors
    /// Returns an error if any resolution component is not strictly positive.
    pub fn per_voxel(spacing: Spacing, pixels: [f64; 3]) -> Result<Self> {
        if pixels.iter().any(|&p| p <= 0.0 || !p.is_finite()) {
            return Err(Error::ConfigError(format!(
                "pixel resolution must be positive, got {pixels:?}"
            )));
        }
        Ok(Self::new(
            spacing.z / pixels[0],
            spacing.x / pixels[1],
            spacing.y / pixels[2],
        ))
    }

    /// Spacing in array axis order.
    #[must_use]
    pub fn as_axes(&self) -> [f64; 3] {
        [self.z, self.x, self.y]
    }

    /// Spacing rescaled so that the finest axis has length 1.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let finest = self.z.min(self.x).min(self.y);
        if finest <= 0.0 || !finest.is_finite() {
            return *self;
        }
        Self::new(self.z / finest, self.x / finest, self.y / finest)
    }

    /// Physical volume of a single voxel.
    #[must_use]
    pub fn voxel_volume(&self) -> f64 {
        self.z * self.x * self.y
    }

    /// Checks that every component is finite and strictly positive.
    ///
    /// # Errors
    /// Returns a configuration error naming the offending spacing.
    pub fn validate(&self) -> Result<()> {
        if self.as_axes().iter().all(|&s| s > 0.0 && s.is_finite()) {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "voxel spacing must be positive, got {self:?}"
            )))
        }
    }
}

/// One channel of an image stack plus its voxel spacing.
#[derive(Debug, Clone)]
pub struct VoxelVolume {
    data: Array3<f64>,
    spacing: Spacing,
}

impl VoxelVolume {
    /// Wraps intensity data with its spacing.
    ///
    /// # Errors
    /// Returns [`Error::EmptyVolume`] when any axis has zero length, or a
    /// configuration error for an invalid spacing.
    pub fn new(data: Array3<f64>, spacing: Spacing) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyVolume);
        }
        spacing.validate()?;
        Ok(Self { data, spacing })
    }

    /// Intensity data.
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Voxel spacing.
    #[must_use]
    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// Shape as `[z, x, y]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        let (z, x, y) = self.data.dim();
        [z, x, y]
    }

    /// Minimum and maximum intensity.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Consumes the volume, returning the raw array.
    #[must_use]
    pub fn into_data(self) -> Array3<f64> {
        self.data
    }
}

impl fmt::Display for VoxelVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = self.range();
        writeln!(f, "shape: {:?}", self.shape())?;
        writeln!(f, "range: ({lo}, {hi})")?;
        write!(
            f,
            "voxel spacing: ({}, {}, {})",
            self.spacing.z, self.spacing.x, self.spacing.y
        )
    }
}

/// Returns `[z, x, y]` for any 3-D array.
#[must_use]
pub fn shape_of<T>(array: &Array3<T>) -> [usize; 3] {
    let (z, x, y) = array.dim();
    [z, x, y]
}

/// Ensures two arrays share a shape.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] otherwise.
pub fn ensure_same_shape<A, B>(expected: &Array3<A>, found: &Array3<B>) -> Result<()> {
    let (expected, found) = (shape_of(expected), shape_of(found));
    if expected == found {
        Ok(())
    } else {
        Err(Error::ShapeMismatch { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_per_voxel_spacing() {
        let spacing = Spacing::per_voxel(Spacing::new(0.5, 0.0625, 0.0625), [1.0, 2.0, 2.0])
            .unwrap();
        assert_relative_eq!(spacing.z, 0.5);
        assert_relative_eq!(spacing.x, 0.03125);
        assert_relative_eq!(spacing.y, 0.03125);
    }

    #[test]
    fn test_per_voxel_rejects_zero_resolution() {
        assert!(Spacing::per_voxel(Spacing::default(), [1.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_normalized_spacing() {
        let spacing = Spacing::new(0.5, 0.0625, 0.0625).normalized();
        assert_relative_eq!(spacing.z, 8.0);
        assert_relative_eq!(spacing.x, 1.0);
        assert_relative_eq!(spacing.y, 1.0);
    }

    #[test]
    fn test_voxel_volume() {
        let spacing = Spacing::new(0.5, 0.0625, 0.0625);
        assert_relative_eq!(1000.0 * spacing.voxel_volume(), 1.953_125);
    }

    #[test]
    fn test_empty_volume_rejected() {
        let data = Array3::<f64>::zeros((0, 4, 4));
        assert!(matches!(
            VoxelVolume::new(data, Spacing::default()),
            Err(Error::EmptyVolume)
        ));
    }

    #[test]
    fn test_volume_range_and_shape() {
        let mut data = Array3::<f64>::zeros((2, 3, 4));
        data[[1, 2, 3]] = 7.5;
        let volume = VoxelVolume::new(data, Spacing::default()).unwrap();
        assert_eq!(volume.shape(), [2, 3, 4]);
        assert_eq!(volume.range(), (0.0, 7.5));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array3::<u32>::zeros((2, 2, 2));
        let b = Array3::<f64>::zeros((2, 2, 3));
        assert!(matches!(
            ensure_same_shape(&a, &b),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

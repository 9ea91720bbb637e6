//! Segmentation and quantification configuration.

use crate::{Error, Result, Spacing};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a channel contains; selects the morphology and filtering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelKind {
    /// Large solid blobs: hole filling plus isotropic erosion/dilation.
    Cell,
    /// Small discrete blobs: median denoising plus area-based pruning.
    Puncta,
}

/// How watershed seed markers are handed to the flood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeedPolicy {
    /// All seeds share a single basin; objects are separated only by the
    /// re-labeling pass afterwards.
    UnlabeledSeeds,
    /// Seeds are connected-component labeled first, one basin per seed
    /// cluster.
    LabeledSeeds,
}

impl ChannelKind {
    /// Seed policy used for this channel unless overridden.
    #[must_use]
    pub fn default_seed_policy(self) -> SeedPolicy {
        match self {
            ChannelKind::Cell => SeedPolicy::UnlabeledSeeds,
            ChannelKind::Puncta => SeedPolicy::LabeledSeeds,
        }
    }
}

/// Voxel neighborhood used by labeling and flooding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Connectivity {
    /// 6 neighbors sharing a face.
    Face,
    /// 26 neighbors sharing a face, edge or corner.
    #[default]
    Full,
}

impl Connectivity {
    /// Neighbor offsets `(dz, dx, dy)`, excluding the origin.
    #[must_use]
    pub fn offsets(self) -> Vec<[isize; 3]> {
        let mut offsets = Vec::with_capacity(26);
        for dz in -1isize..=1 {
            for dx in -1isize..=1 {
                for dy in -1isize..=1 {
                    let steps = dz.abs() + dx.abs() + dy.abs();
                    let keep = match self {
                        Connectivity::Face => steps == 1,
                        Connectivity::Full => steps > 0,
                    };
                    if keep {
                        offsets.push([dz, dx, dy]);
                    }
                }
            }
        }
        offsets
    }

    /// Offsets that precede the origin in raster order.
    #[must_use]
    pub fn backward_offsets(self) -> Vec<[isize; 3]> {
        self.offsets()
            .into_iter()
            .filter(|&[dz, dx, dy]| dz < 0 || (dz == 0 && (dx < 0 || (dx == 0 && dy < 0))))
            .collect()
    }
}

/// Parameters for one channel's segmentation run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentationConfig {
    /// Channel content.
    pub kind: ChannelKind,
    /// Gaussian standard deviation in voxels.
    pub sigma: f64,
    /// Morphology size: erosion/dilation radius is `width / 2` for cells,
    /// minimum hole/object size is `width³` voxels for puncta.
    pub width: u32,
    /// Per-voxel spacing of the channel.
    pub spacing: Spacing,
    /// Watershed seed policy.
    pub seed_policy: SeedPolicy,
}

impl SegmentationConfig {
    /// Creates a configuration with the kind's default seed policy.
    #[must_use]
    pub fn new(kind: ChannelKind, sigma: f64, width: u32, spacing: Spacing) -> Self {
        Self {
            kind,
            sigma,
            width,
            spacing,
            seed_policy: kind.default_seed_policy(),
        }
    }

    /// Cell-channel defaults.
    #[must_use]
    pub fn cells(spacing: Spacing) -> Self {
        Self::new(ChannelKind::Cell, 20.0, 20, spacing)
    }

    /// Puncta-channel defaults.
    #[must_use]
    pub fn puncta(spacing: Spacing) -> Self {
        Self::new(ChannelKind::Puncta, 1.0, 5, spacing)
    }

    /// Sets the Gaussian sigma.
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Sets the morphology width.
    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Overrides the seed policy.
    #[must_use]
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    /// Erosion/dilation radius for cell channels.
    #[must_use]
    pub fn morphology_radius(&self) -> f64 {
        f64::from(self.width) / 2.0
    }

    /// Minimum hole/object size in voxels for puncta channels.
    #[must_use]
    pub fn min_component_size(&self) -> usize {
        let width = self.width as usize;
        width.saturating_mul(width).saturating_mul(width)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for negative or non-finite sigma or an
    /// invalid spacing.
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma >= 0.0 && self.sigma.is_finite()) {
            return Err(Error::ConfigError(format!(
                "sigma must be finite and non-negative, got {}",
                self.sigma
            )));
        }
        self.spacing.validate()
    }
}

/// Parameters for the quantification engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuantificationConfig {
    /// Strict radius for confirmed puncta overlap (voxels).
    pub threshold: f64,
    /// Radius for cell membership and candidate overlap (voxels).
    pub dist: f64,
    /// Exclusive lower area bound for puncta.
    pub puncta_min: f64,
    /// Exclusive upper area bound for puncta.
    pub puncta_max: f64,
    /// Exclusive lower area bound for cells.
    pub cell_min: f64,
    /// Exclusive upper area bound for cells.
    pub cell_max: f64,
    /// Per-voxel spacing (microscope spacing divided by pixel resolution),
    /// used to convert areas to physical volumes.
    pub spacing: Spacing,
}

impl Default for QuantificationConfig {
    fn default() -> Self {
        Self {
            threshold: 15.0,
            dist: 180.0,
            puncta_min: 90.0,
            puncta_max: 5000.0,
            cell_min: 25_000.0,
            cell_max: 60_000.0,
            spacing: Spacing::new(0.5, 0.0625, 0.0625),
        }
    }
}

impl QuantificationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the confirmed-overlap radius.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the membership radius.
    #[must_use]
    pub fn with_dist(mut self, dist: f64) -> Self {
        self.dist = dist;
        self
    }

    /// Sets the puncta area bounds.
    #[must_use]
    pub fn with_puncta_range(mut self, min: f64, max: f64) -> Self {
        self.puncta_min = min;
        self.puncta_max = max;
        self
    }

    /// Sets the cell area bounds.
    #[must_use]
    pub fn with_cell_range(mut self, min: f64, max: f64) -> Self {
        self.cell_min = min;
        self.cell_max = max;
        self
    }

    /// Sets the voxel spacing.
    #[must_use]
    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error when `threshold > dist`, either radius is
    /// negative or NaN, or the spacing is invalid.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold >= 0.0 && self.dist >= 0.0) {
            return Err(Error::ConfigError(format!(
                "radii must be non-negative, got threshold={} dist={}",
                self.threshold, self.dist
            )));
        }
        if self.threshold > self.dist {
            return Err(Error::ConfigError(format!(
                "threshold ({}) must not exceed dist ({})",
                self.threshold, self.dist
            )));
        }
        self.spacing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::Face.offsets().len(), 6);
        assert_eq!(Connectivity::Full.offsets().len(), 26);
        assert_eq!(Connectivity::Face.backward_offsets().len(), 3);
        assert_eq!(Connectivity::Full.backward_offsets().len(), 13);
    }

    #[test]
    fn test_seed_policy_defaults() {
        let spacing = Spacing::default();
        assert_eq!(
            SegmentationConfig::cells(spacing).seed_policy,
            SeedPolicy::UnlabeledSeeds
        );
        assert_eq!(
            SegmentationConfig::puncta(spacing).seed_policy,
            SeedPolicy::LabeledSeeds
        );
        let overridden =
            SegmentationConfig::cells(spacing).with_seed_policy(SeedPolicy::LabeledSeeds);
        assert_eq!(overridden.seed_policy, SeedPolicy::LabeledSeeds);
    }

    #[test]
    fn test_segmentation_sizes() {
        let config = SegmentationConfig::puncta(Spacing::default()).with_width(5);
        assert_eq!(config.min_component_size(), 125);
        let config = SegmentationConfig::cells(Spacing::default()).with_width(5);
        assert!((config.morphology_radius() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_sigma_rejected() {
        let config = SegmentationConfig::puncta(Spacing::default()).with_sigma(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quantification_config_builder() {
        let config = QuantificationConfig::new()
            .with_threshold(2.0)
            .with_dist(10.0)
            .with_puncta_range(1.0, 100.0)
            .with_cell_range(5.0, 500.0);
        assert!(config.validate().is_ok());
        assert!((config.puncta_max - 100.0).abs() < f64::EPSILON);
        assert!((config.cell_min - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_above_dist_rejected() {
        let config = QuantificationConfig::new().with_threshold(20.0).with_dist(10.0);
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }
}

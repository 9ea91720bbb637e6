//! Analysis configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use speckle_core::{ChannelKind, QuantificationConfig, SegmentationConfig, Spacing};
use speckle_io::ChannelLayout;
use std::path::Path;

/// Segmentation parameters for one channel of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Channel index in the stack.
    pub channel: usize,
    /// Gaussian standard deviation in voxels.
    pub sigma: f64,
    /// Morphology width in voxels.
    pub width: u32,
}

/// Quantification parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantParams {
    /// Colocalization radius.
    pub threshold: f64,
    /// Membership radius.
    pub dist: f64,
    /// Exclusive lower area bound for puncta.
    pub puncta_min: f64,
    /// Exclusive upper area bound for puncta.
    pub puncta_max: f64,
    /// Exclusive lower area bound for cells.
    pub cell_min: f64,
    /// Exclusive upper area bound for cells.
    pub cell_max: f64,
}

impl Default for QuantParams {
    fn default() -> Self {
        let defaults = QuantificationConfig::default();
        Self {
            threshold: defaults.threshold,
            dist: defaults.dist,
            puncta_min: defaults.puncta_min,
            puncta_max: defaults.puncta_max,
            cell_min: defaults.cell_min,
            cell_max: defaults.cell_max,
        }
    }
}

/// Full configuration of an `analyze` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Microscope spacing (z, x, y).
    pub spacing: Spacing,
    /// Pixel resolution (z, x, y); voxel spacing is `spacing / pixels`.
    pub pixels: [f64; 3],
    /// Page layout of the input stack.
    pub layout: ChannelLayout,
    /// Cell channel.
    pub cells: ChannelParams,
    /// Puncta-type-1 channel.
    pub puncta1: ChannelParams,
    /// Puncta-type-2 channel.
    pub puncta2: ChannelParams,
    /// Quantification parameters.
    pub quantification: QuantParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spacing: Spacing::new(0.5, 0.0625, 0.0625),
            pixels: [1.0; 3],
            layout: ChannelLayout::Interleaved,
            cells: ChannelParams {
                channel: 0,
                sigma: 20.0,
                width: 20,
            },
            puncta1: ChannelParams {
                channel: 1,
                sigma: 1.0,
                width: 5,
            },
            puncta2: ChannelParams {
                channel: 2,
                sigma: 2.0,
                width: 3,
            },
            quantification: QuantParams::default(),
        }
    }
}

impl AnalysisConfig {
    /// Reads a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Per-voxel spacing.
    ///
    /// # Errors
    /// Returns an error for non-positive spacing or resolution.
    pub fn voxel_spacing(&self) -> crate::Result<Spacing> {
        let spacing = Spacing::per_voxel(self.spacing, self.pixels)?;
        spacing.validate()?;
        Ok(spacing)
    }

    /// Segmentation configuration for one channel.
    ///
    /// # Errors
    /// Returns an error when the voxel spacing is invalid.
    pub fn segmentation(
        &self,
        kind: ChannelKind,
        params: ChannelParams,
    ) -> crate::Result<SegmentationConfig> {
        Ok(SegmentationConfig::new(
            kind,
            params.sigma,
            params.width,
            self.voxel_spacing()?,
        ))
    }

    /// Quantification configuration using the voxel spacing.
    ///
    /// # Errors
    /// Returns an error when the spacing or the radii are invalid.
    pub fn quantification(&self) -> crate::Result<QuantificationConfig> {
        let q = &self.quantification;
        let config = QuantificationConfig::new()
            .with_threshold(q.threshold)
            .with_dist(q.dist)
            .with_puncta_range(q.puncta_min, q.puncta_max)
            .with_cell_range(q.cell_min, q.cell_max)
            .with_spacing(self.voxel_spacing()?);
        config.validate()?;
        Ok(config)
    }
}

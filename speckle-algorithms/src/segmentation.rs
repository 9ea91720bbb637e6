//! Per-channel segmentation pipeline.
//!
//! 1. Gaussian smoothing (plus a 3×3×3 median for puncta)
//! 2. Sobel boundary strength
//! 3. Li threshold and channel-specific morphology
//! 4. 26-connected labeling and anisotropic distance transform
//! 5. Centroid-seeded watershed, re-labeling and measurement
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::distance::distance_transform;
use crate::filters::{gaussian_filter, median_filter, sobel_magnitude};
use crate::labeling::{label_mask, relabel};
use crate::morphology::clean_mask;
use crate::regions::{max_label, measure_objects};
use crate::threshold::{binarize, li_threshold};
use crate::watershed::watershed;
use log::{debug, info, warn};
use ndarray::Array3;
use speckle_core::volume::{ensure_same_shape, shape_of};
use speckle_core::{
    ChannelKind, Connectivity, DistanceVolume, Error, LabelVolume, MaskVolume, ObjectRecord, Result,
    SeedPolicy, SegmentationConfig, VoxelVolume,
};

/// Output of the watershed split.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// One record per final object, ordered by id.
    pub objects: Vec<ObjectRecord>,
    /// Raw watershed basins.
    pub segmented: LabelVolume,
    /// Basins re-labeled into contiguous connected objects.
    pub relabeled: LabelVolume,
}

/// Everything one channel run produces.
#[derive(Debug, Clone)]
pub struct ChannelSegmentation {
    /// Configuration the run used.
    pub config: SegmentationConfig,
    /// Distance transform of the cleaned mask.
    pub distance: DistanceVolume,
    /// Connected components of the cleaned mask.
    pub labels: LabelVolume,
    /// Watershed output.
    pub segmentation: Segmentation,
}

impl ChannelSegmentation {
    /// Final object records.
    #[must_use]
    pub fn objects(&self) -> &[ObjectRecord] {
        &self.segmentation.objects
    }

    /// Final relabeled object volume.
    #[must_use]
    pub fn relabeled(&self) -> &LabelVolume {
        &self.segmentation.relabeled
    }
}

/// Smoothed Sobel edge strength for a channel.
#[must_use]
pub fn boundary_strength(volume: &VoxelVolume, config: &SegmentationConfig) -> Array3<f64> {
    let smoothed = gaussian_filter(volume.data(), config.sigma);
    let denoised = match config.kind {
        ChannelKind::Cell => smoothed,
        ChannelKind::Puncta => median_filter(&smoothed),
    };
    sobel_magnitude(&denoised)
}

/// Thresholds, cleans and labels a channel.
///
/// Returns the distance transform of the labeled mask and the labels.
///
/// # Errors
/// Returns [`speckle_core::Error::DegenerateThreshold`] when the Li threshold
/// selects no voxel or mask cleanup removes every voxel, or a configuration
/// error for invalid parameters.
pub fn segment_channel(
    volume: &VoxelVolume,
    config: &SegmentationConfig,
) -> Result<(DistanceVolume, LabelVolume)> {
    config.validate()?;

    let edges = boundary_strength(volume, config);
    let threshold = li_threshold(&edges);
    info!("{:?} channel: li threshold {threshold:.6}", config.kind);

    let mask = binarize(&edges, threshold)?;
    let cleaned = clean_mask(&mask, config);
    let (labels, count) = label_mask(&cleaned, Connectivity::Full);
    info!("{:?} channel: {count} connected components", config.kind);
    if count == 0 {
        warn!("{:?} channel: mask cleanup left no foreground", config.kind);
        return Err(Error::DegenerateThreshold { threshold });
    }

    let distance = distance_transform(&labels, config.spacing);
    Ok((distance, labels))
}

/// Builds one seed per label at its rounded centroid.
///
/// A centroid that falls outside its own label is moved to the label voxel
/// closest to it, so every label receives exactly one seed.
#[must_use]
pub fn seed_markers(labels: &LabelVolume) -> MaskVolume {
    let count = max_label(labels);
    let objects = measure_objects(labels, count);
    let shape = shape_of(labels);
    let mut seeds = MaskVolume::from_elem(labels.raw_dim(), false);

    // Per label: (best squared distance, best voxel), only for labels whose
    // rounded centroid missed.
    let mut relocate: Vec<Option<(f64, [usize; 3])>> = vec![None; count + 1];
    let mut centroids = vec![[0.0f64; 3]; count + 1];

    for object in &objects {
        let label = object.id.as_u32();
        let rounded = round_to_voxel(object.centroid, shape);
        if labels[rounded] == label {
            seeds[rounded] = true;
        } else {
            relocate[label as usize] = Some((f64::INFINITY, rounded));
            centroids[label as usize] = object.centroid;
        }
    }

    let misses = relocate.iter().filter(|slot| slot.is_some()).count();
    if misses == 0 {
        return seeds;
    }
    warn!("{misses} centroid(s) fall outside their object; relocating seeds");

    for ((z, x, y), &label) in labels.indexed_iter() {
        let Some((best, voxel)) = relocate[label as usize].as_mut() else {
            continue;
        };
        let c = centroids[label as usize];
        let d2 = (z as f64 - c[0]).powi(2) + (x as f64 - c[1]).powi(2) + (y as f64 - c[2]).powi(2);
        if d2 < *best {
            *best = d2;
            *voxel = [z, x, y];
        }
    }
    for (_, voxel) in relocate.into_iter().flatten() {
        seeds[voxel] = true;
    }
    seeds
}

fn round_to_voxel(centroid: [f64; 3], shape: [usize; 3]) -> [usize; 3] {
    let mut voxel = [0usize; 3];
    for axis in 0..3 {
        let max = shape[axis].saturating_sub(1) as f64;
        voxel[axis] = centroid[axis].round().clamp(0.0, max) as usize;
    }
    voxel
}

/// Splits labeled objects by watershed on the distance transform.
///
/// # Errors
/// Returns a shape mismatch error when the two volumes differ in shape.
pub fn split_objects(
    distance: &DistanceVolume,
    labels: &LabelVolume,
    policy: SeedPolicy,
) -> Result<Segmentation> {
    ensure_same_shape(distance, labels)?;

    let seeds = seed_markers(labels);
    let markers = match policy {
        SeedPolicy::UnlabeledSeeds => seeds.mapv(u32::from),
        SeedPolicy::LabeledSeeds => label_mask(&seeds, Connectivity::Full).0,
    };
    debug!(
        "{policy:?}: {} seed voxel(s), {} basin id(s)",
        seeds.iter().filter(|&&s| s).count(),
        max_label(&markers)
    );

    let mask = labels.mapv(|label| label != 0);
    let segmented = watershed(distance, &markers, &mask, Connectivity::Full)?;
    let (relabeled, count) = relabel(&segmented, Connectivity::Full);
    let objects = measure_objects(&relabeled, count);
    info!("watershed produced {} object(s)", objects.len());

    Ok(Segmentation {
        objects,
        segmented,
        relabeled,
    })
}

/// Runs the whole pipeline for one channel.
///
/// # Errors
/// Propagates threshold, configuration and shape errors from the stages.
pub fn segment(volume: &VoxelVolume, config: &SegmentationConfig) -> Result<ChannelSegmentation> {
    let (distance, labels) = segment_channel(volume, config)?;
    let segmentation = split_objects(&distance, &labels, config.seed_policy)?;
    Ok(ChannelSegmentation {
        config: config.clone(),
        distance,
        labels,
        segmentation,
    })
}

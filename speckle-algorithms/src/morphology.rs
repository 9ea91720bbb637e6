//! Binary morphology on foreground masks.

use crate::distance::euclidean_distance_transform;
use crate::labeling::{component_sizes, label_mask};
use crate::neighborhood::{on_border, Neighborhood};
use log::debug;
use speckle_core::volume::shape_of;
use speckle_core::{ChannelKind, Connectivity, MaskVolume, SegmentationConfig};
use std::collections::VecDeque;

const UNIT_SAMPLING: [f64; 3] = [1.0, 1.0, 1.0];

/// Fills every background region not reachable from the volume border.
#[must_use]
pub fn fill_holes(mask: &MaskVolume) -> MaskVolume {
    let shape = shape_of(mask);
    let hood = Neighborhood::new(shape, Connectivity::Face);
    let mut outside = MaskVolume::from_elem(mask.raw_dim(), false);
    let mut queue = VecDeque::new();

    for ((z, x, y), &fg) in mask.indexed_iter() {
        if !fg && on_border([z, x, y], shape) {
            outside[[z, x, y]] = true;
            queue.push_back([z, x, y]);
        }
    }
    while let Some(index) = queue.pop_front() {
        for neighbor in hood.around(index) {
            if !mask[neighbor] && !outside[neighbor] {
                outside[neighbor] = true;
                queue.push_back(neighbor);
            }
        }
    }

    outside.mapv(|reached| !reached)
}

/// Keeps voxels farther than `radius` from the background.
#[must_use]
pub fn isotropic_erosion(mask: &MaskVolume, radius: f64) -> MaskVolume {
    euclidean_distance_transform(mask, UNIT_SAMPLING).mapv(|d| d > radius)
}

/// Adds voxels within `radius` of the foreground.
#[must_use]
pub fn isotropic_dilation(mask: &MaskVolume, radius: f64) -> MaskVolume {
    let background = mask.mapv(|fg| !fg);
    euclidean_distance_transform(&background, UNIT_SAMPLING).mapv(|d| d <= radius)
}

/// Removes foreground components smaller than `min_size` voxels.
#[must_use]
pub fn remove_small_objects(
    mask: &MaskVolume,
    min_size: usize,
    connectivity: Connectivity,
) -> MaskVolume {
    let (labels, count) = label_mask(mask, connectivity);
    let sizes = component_sizes(&labels, count);
    let removed = sizes[1..].iter().filter(|&&size| size < min_size).count();
    debug!("removing {removed} of {count} components below {min_size} voxels");
    labels.mapv(|label| label != 0 && sizes[label as usize] >= min_size)
}

/// Fills background components smaller than `min_size` voxels.
#[must_use]
pub fn remove_small_holes(
    mask: &MaskVolume,
    min_size: usize,
    connectivity: Connectivity,
) -> MaskVolume {
    let inverted = mask.mapv(|fg| !fg);
    remove_small_objects(&inverted, min_size, connectivity).mapv(|fg| !fg)
}

/// Applies the channel's cleanup policy to a thresholded mask.
///
/// Cells: hole filling, then isotropic erosion and dilation by `width / 2`.
/// Puncta: small-hole filling, then small-object removal at `width³` voxels.
#[must_use]
pub fn clean_mask(mask: &MaskVolume, config: &SegmentationConfig) -> MaskVolume {
    match config.kind {
        ChannelKind::Cell => {
            let radius = config.morphology_radius();
            let filled = fill_holes(mask);
            let eroded = isotropic_erosion(&filled, radius);
            isotropic_dilation(&eroded, radius)
        }
        ChannelKind::Puncta => {
            let min_size = config.min_component_size();
            let closed = remove_small_holes(mask, min_size, Connectivity::Face);
            remove_small_objects(&closed, min_size, Connectivity::Face)
        }
    }
}

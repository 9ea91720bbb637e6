//! Marker-controlled watershed by priority flooding.
//!
//! Voxels are claimed in ascending elevation order, ties broken by the
//! order in which they entered the queue, and each claimed voxel takes
//! the basin of the voxel that reached it first.

use crate::neighborhood::Neighborhood;
use ndarray::Array3;
use speckle_core::volume::{ensure_same_shape, shape_of};
use speckle_core::{Connectivity, LabelVolume, MaskVolume, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Queue entry; ordered so that `BinaryHeap` pops the lowest elevation,
/// then the oldest entry.
#[derive(Debug, Clone, Copy)]
struct FloodEntry {
    elevation: f64,
    age: u64,
    index: [usize; 3],
}

impl Ord for FloodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.age.cmp(&self.age))
    }
}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

/// Floods `elevation` from the non-zero `markers`, never leaving `mask`.
///
/// Markers outside the mask are ignored. Mask voxels unreachable from any
/// marker stay 0.
///
/// # Errors
/// Returns a shape mismatch error when the three volumes differ in shape.
pub fn watershed(
    elevation: &Array3<f64>,
    markers: &LabelVolume,
    mask: &MaskVolume,
    connectivity: Connectivity,
) -> Result<LabelVolume> {
    ensure_same_shape(elevation, markers)?;
    ensure_same_shape(elevation, mask)?;

    let hood = Neighborhood::new(shape_of(elevation), connectivity);
    let mut basins = LabelVolume::zeros(markers.raw_dim());
    let mut queue = BinaryHeap::new();
    let mut age = 0u64;

    for ((z, x, y), &marker) in markers.indexed_iter() {
        if marker == 0 || !mask[[z, x, y]] {
            continue;
        }
        basins[[z, x, y]] = marker;
        queue.push(FloodEntry {
            elevation: elevation[[z, x, y]],
            age,
            index: [z, x, y],
        });
        age += 1;
    }

    while let Some(entry) = queue.pop() {
        let basin = basins[entry.index];
        for neighbor in hood.around(entry.index) {
            if !mask[neighbor] || basins[neighbor] != 0 {
                continue;
            }
            basins[neighbor] = basin;
            queue.push(FloodEntry {
                elevation: elevation[neighbor],
                age,
                index: neighbor,
            });
            age += 1;
        }
    }

    Ok(basins)
}

//! Connected component labeling.
//!
//! Two-pass raster labeling with a union-find over provisional labels.
//! Final ids are contiguous from 1 and follow the raster order of each
//! component's first voxel.

use crate::neighborhood::Neighborhood;
use ndarray::Array3;
use speckle_core::volume::shape_of;
use speckle_core::{Connectivity, LabelVolume, MaskVolume};

/// Union-Find data structure over provisional labels. Set 0 is background.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: vec![0],
            rank: vec![0],
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.rank.push(0);
        id
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] = self.rank[px].saturating_add(1);
            }
        }
    }
}

/// Labels connected regions of equal value, skipping `background`.
///
/// Returns the label volume and the number of regions.
#[allow(clippy::cast_possible_truncation)]
pub fn label_by_value<T: Copy + PartialEq>(
    values: &Array3<T>,
    background: T,
    connectivity: Connectivity,
) -> (LabelVolume, usize) {
    let shape = shape_of(values);
    let hood = Neighborhood::backward(shape, connectivity);
    let mut provisional = LabelVolume::zeros(values.raw_dim());
    let mut sets = UnionFind::new();

    for ((z, x, y), &value) in values.indexed_iter() {
        if value == background {
            continue;
        }
        let mut assigned = 0usize;
        for neighbor in hood.around([z, x, y]) {
            if values[neighbor] != value {
                continue;
            }
            let label = provisional[neighbor] as usize;
            if assigned == 0 {
                assigned = label;
            } else if label != assigned {
                sets.union(assigned, label);
            }
        }
        if assigned == 0 {
            assigned = sets.make_set();
        }
        provisional[[z, x, y]] = assigned as u32;
    }

    let mut final_ids = vec![0u32; sets.len()];
    let mut count = 0u32;
    for label in &mut provisional {
        if *label == 0 {
            continue;
        }
        let root = sets.find(*label as usize);
        if final_ids[root] == 0 {
            count += 1;
            final_ids[root] = count;
        }
        *label = final_ids[root];
    }

    (provisional, count as usize)
}

/// Labels the connected foreground components of a binary mask.
#[must_use]
pub fn label_mask(mask: &MaskVolume, connectivity: Connectivity) -> (LabelVolume, usize) {
    label_by_value(mask, false, connectivity)
}

/// Re-labels a label volume so every connected region of equal value gets
/// its own contiguous id.
#[must_use]
pub fn relabel(labels: &LabelVolume, connectivity: Connectivity) -> (LabelVolume, usize) {
    label_by_value(labels, 0, connectivity)
}

/// Voxel count per label, indexed by label value (index 0 is background).
#[must_use]
pub fn component_sizes(labels: &LabelVolume, count: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; count + 1];
    for &label in labels {
        if let Some(size) = sizes.get_mut(label as usize) {
            *size += 1;
        }
    }
    sizes
}

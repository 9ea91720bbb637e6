//! Exact Euclidean distance transform with anisotropic sampling.
//!
//! Separable lower-envelope algorithm (Felzenszwalb & Huttenlocher):
//! squared distances are propagated one axis at a time, scaled by the
//! sampling of that axis.
#![allow(clippy::cast_precision_loss)]

use ndarray::{Array3, Axis, Zip};
use speckle_core::{DistanceVolume, LabelVolume, MaskVolume, Spacing};

/// Distance from every foreground voxel to the nearest background voxel.
///
/// Background voxels are 0. Without any background voxel every distance is
/// infinite.
#[must_use]
pub fn euclidean_distance_transform(foreground: &MaskVolume, sampling: [f64; 3]) -> DistanceVolume {
    let mut squared: Array3<f64> = foreground.mapv(|fg| if fg { f64::INFINITY } else { 0.0 });
    for (axis, &step) in sampling.iter().enumerate() {
        Zip::from(squared.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let line: Vec<f64> = lane.iter().copied().collect();
            let envelope = squared_distance_1d(&line, step);
            for (out, value) in lane.iter_mut().zip(envelope) {
                *out = value;
            }
        });
    }
    squared.mapv_inplace(f64::sqrt);
    squared
}

/// Distance transform of a label volume, with the spacing normalized so the
/// finest axis has unit length.
#[must_use]
pub fn distance_transform(labels: &LabelVolume, spacing: Spacing) -> DistanceVolume {
    let foreground = labels.mapv(|label| label != 0);
    euclidean_distance_transform(&foreground, spacing.normalized().as_axes())
}

/// 1-D squared distance transform of sampled function `f`.
fn squared_distance_1d(f: &[f64], step: f64) -> Vec<f64> {
    let n = f.len();
    let mut out = vec![f64::INFINITY; n];
    let mut sites: Vec<usize> = Vec::with_capacity(n);
    let mut bounds: Vec<f64> = Vec::with_capacity(n);

    for q in (0..n).filter(|&q| f[q].is_finite()) {
        let pq = q as f64 * step;
        let mut boundary = f64::NEG_INFINITY;
        while let Some(&last) = sites.last() {
            let pv = last as f64 * step;
            let s = ((f[q] + pq * pq) - (f[last] + pv * pv)) / (2.0 * (pq - pv));
            if s <= bounds[bounds.len() - 1] {
                sites.pop();
                bounds.pop();
            } else {
                boundary = s;
                break;
            }
        }
        sites.push(q);
        bounds.push(boundary);
    }

    if sites.is_empty() {
        return out;
    }

    let mut k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let pq = q as f64 * step;
        while k + 1 < sites.len() && bounds[k + 1] < pq {
            k += 1;
        }
        let pv = sites[k] as f64 * step;
        *slot = (pq - pv) * (pq - pv) + f[sites[k]];
    }
    out
}

//! Li minimum cross-entropy thresholding.
#![allow(clippy::cast_precision_loss)]

use log::debug;
use ndarray::Array3;
use rayon::prelude::*;
use speckle_core::{Error, MaskVolume, Result};

/// Upper bound on Li iterations; convergence normally takes a handful.
const MAX_LI_ITERATIONS: usize = 10_000;

/// Computes Li's iterative minimum cross-entropy threshold.
///
/// NaN values are ignored. A volume whose finite values are all equal
/// returns that value; an all-NaN volume returns NaN.
#[must_use]
pub fn li_threshold(values: &Array3<f64>) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.par_sort_unstable_by(f64::total_cmp);

    let image_min = sorted[0];
    let image_max = sorted[sorted.len() - 1];
    if image_min == image_max {
        return image_min;
    }

    // Half the smallest gap between distinct values.
    let tolerance = sorted
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap > 0.0)
        .fold(f64::INFINITY, f64::min)
        / 2.0;

    let shifted: Vec<f64> = sorted.iter().map(|v| v - image_min).collect();
    let mean = shifted.iter().sum::<f64>() / shifted.len() as f64;

    let mut t_next = mean;
    let mut t_curr = -2.0 * tolerance;
    let mut iterations = 0;
    while (t_next - t_curr).abs() > tolerance && iterations < MAX_LI_ITERATIONS {
        t_curr = t_next;
        // `shifted` is sorted, so the foreground is a suffix.
        let split = shifted.partition_point(|&v| v <= t_curr);
        let (back, fore) = shifted.split_at(split);
        if back.is_empty() || fore.is_empty() {
            break;
        }
        let mean_back = back.iter().sum::<f64>() / back.len() as f64;
        let mean_fore = fore.iter().sum::<f64>() / fore.len() as f64;
        if mean_back == 0.0 {
            break;
        }
        t_next = (mean_back - mean_fore) / (mean_back.ln() - mean_fore.ln());
        iterations += 1;
    }
    debug!("li threshold converged after {iterations} iterations");

    t_next + image_min
}

/// Marks voxels strictly above `threshold` as foreground.
///
/// # Errors
/// Returns [`Error::DegenerateThreshold`] when no voxel exceeds the threshold.
pub fn binarize(values: &Array3<f64>, threshold: f64) -> Result<MaskVolume> {
    let mask = values.mapv(|v| v > threshold);
    if mask.iter().any(|&fg| fg) {
        Ok(mask)
    } else {
        Err(Error::DegenerateThreshold { threshold })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_li_constant_volume() {
        let values = Array3::from_elem((3, 3, 3), 4.0);
        assert_relative_eq!(li_threshold(&values), 4.0);
    }

    #[test]
    fn test_li_all_nan() {
        let values = Array3::from_elem((2, 2, 2), f64::NAN);
        assert!(li_threshold(&values).is_nan());
    }

    #[test]
    fn test_li_bimodal() {
        let values = Array3::from_shape_fn((2, 10, 10), |(z, x, y)| {
            let noise = ((x * 7 + y * 3) % 5) as f64 * 0.1;
            if z == 0 {
                1.0 + noise
            } else {
                10.0 + noise
            }
        });
        let threshold = li_threshold(&values);
        assert!(threshold > 1.5 && threshold < 10.0, "threshold {threshold}");
    }

    #[test]
    fn test_binarize_strict() {
        let values = Array3::from_shape_fn((1, 1, 3), |(_, _, y)| y as f64);
        let mask = binarize(&values, 1.0).unwrap();
        assert_eq!(mask.iter().copied().collect::<Vec<_>>(), vec![false, false, true]);
    }

    #[test]
    fn test_binarize_uniform_is_degenerate() {
        let values = Array3::from_elem((2, 2, 2), 1.0);
        let threshold = li_threshold(&values);
        assert!(matches!(
            binarize(&values, threshold),
            Err(Error::DegenerateThreshold { .. })
        ));
    }
}

//! Separable smoothing, median denoising and Sobel edge strength.
//!
//! Every filter uses the half-sample symmetric boundary, so a constant
//! volume passes through unchanged.
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::neighborhood::reflect;
use ndarray::{Array3, Axis, Zip};

/// Kernel radius in multiples of sigma.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Sobel smoothing taps applied across the derivative axis.
const SOBEL_SMOOTH: [f64; 3] = [0.25, 0.5, 0.25];

/// Sobel derivative taps.
const SOBEL_EDGE: [f64; 3] = [1.0, 0.0, -1.0];

/// Normalized 1-D Gaussian kernel truncated at `4σ`.
#[must_use]
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);
    kernel
}

/// Correlates every lane along `axis` with an odd-length kernel.
#[must_use]
pub fn correlate_axis(input: &Array3<f64>, axis: usize, kernel: &[f64]) -> Array3<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut output = Array3::<f64>::zeros(input.raw_dim());
    Zip::from(output.lanes_mut(Axis(axis)))
        .and(input.lanes(Axis(axis)))
        .par_for_each(|mut out, lane| {
            let len = lane.len();
            for i in 0..len {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let pos = i as isize + k as isize - radius;
                    acc += weight * lane[reflect(pos, len)];
                }
                out[i] = acc;
            }
        });
    output
}

/// Isotropic Gaussian smoothing with standard deviation `sigma` voxels.
#[must_use]
pub fn gaussian_filter(input: &Array3<f64>, sigma: f64) -> Array3<f64> {
    let kernel = gaussian_kernel(sigma);
    if kernel.len() == 1 {
        return input.clone();
    }
    let smoothed = correlate_axis(input, 0, &kernel);
    let smoothed = correlate_axis(&smoothed, 1, &kernel);
    correlate_axis(&smoothed, 2, &kernel)
}

/// 3×3×3 median filter.
#[must_use]
pub fn median_filter(input: &Array3<f64>) -> Array3<f64> {
    let (nz, nx, ny) = input.dim();
    let mut output = Array3::<f64>::zeros(input.raw_dim());
    Zip::indexed(&mut output).par_for_each(|(z, x, y), out| {
        let mut window = [0.0f64; 27];
        let mut n = 0;
        for dz in -1isize..=1 {
            let zz = reflect(z as isize + dz, nz);
            for dx in -1isize..=1 {
                let xx = reflect(x as isize + dx, nx);
                for dy in -1isize..=1 {
                    window[n] = input[[zz, xx, reflect(y as isize + dy, ny)]];
                    n += 1;
                }
            }
        }
        let (_, median, _) = window.select_nth_unstable_by(13, f64::total_cmp);
        *out = *median;
    });
    output
}

/// Sobel gradient magnitude, `sqrt(Σ g_axis² / 3)`.
#[must_use]
pub fn sobel_magnitude(input: &Array3<f64>) -> Array3<f64> {
    let mut magnitude = Array3::<f64>::zeros(input.raw_dim());
    for axis in 0..3 {
        let mut gradient = correlate_axis(input, axis, &SOBEL_EDGE);
        for other in (0..3).filter(|&other| other != axis) {
            gradient = correlate_axis(&gradient, other, &SOBEL_SMOOTH);
        }
        magnitude.zip_mut_with(&gradient, |acc, g| *acc += g * g);
    }
    magnitude.mapv_inplace(|sum| (sum / 3.0).sqrt());
    magnitude
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_kernel_normalized() {
        let kernel = gaussian_kernel(1.0);
        assert_eq!(kernel.len(), 9);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(kernel[4] > kernel[3]);
        assert_relative_eq!(kernel[3], kernel[5]);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_identity() {
        let input = Array3::from_shape_fn((3, 4, 5), |(z, x, y)| (z * 20 + x * 5 + y) as f64);
        assert_eq!(gaussian_filter(&input, 0.0), input);
    }

    #[test]
    fn test_gaussian_preserves_constant() {
        let input = Array3::from_elem((4, 6, 6), 3.5);
        let smoothed = gaussian_filter(&input, 2.0);
        for v in &smoothed {
            assert_relative_eq!(*v, 3.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_gaussian_spreads_impulse() {
        let mut input = Array3::<f64>::zeros((9, 9, 9));
        input[[4, 4, 4]] = 1.0;
        let smoothed = gaussian_filter(&input, 1.0);
        assert!(smoothed[[4, 4, 4]] < 1.0);
        assert!(smoothed[[4, 4, 5]] > 0.0);
        assert_relative_eq!(smoothed.sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_median_removes_spike() {
        let mut input = Array3::<f64>::zeros((5, 5, 5));
        input[[2, 2, 2]] = 100.0;
        let filtered = median_filter(&input);
        assert!(filtered.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_median_keeps_solid_block() {
        let input = Array3::from_shape_fn((6, 6, 6), |(z, _, _)| if z < 3 { 1.0 } else { 5.0 });
        let filtered = median_filter(&input);
        assert_relative_eq!(filtered[[0, 3, 3]], 1.0);
        assert_relative_eq!(filtered[[5, 3, 3]], 5.0);
    }

    #[test]
    fn test_sobel_flat_and_step() {
        let flat = Array3::from_elem((4, 4, 4), 2.0);
        assert!(sobel_magnitude(&flat).iter().all(|&v| v.abs() < 1e-12));

        let step = Array3::from_shape_fn((4, 8, 4), |(_, x, _)| if x < 4 { 0.0 } else { 1.0 });
        let edges = sobel_magnitude(&step);
        assert!(edges[[2, 3, 2]] > 0.0);
        assert!(edges[[2, 4, 2]] > 0.0);
        assert!(edges[[2, 0, 2]].abs() < 1e-12);
        assert!(edges[[2, 7, 2]].abs() < 1e-12);
    }
}

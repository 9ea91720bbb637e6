//! Per-label centroid and area measurement.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use speckle_core::{LabelVolume, ObjectRecord};

/// Measures every label `1..=count`, in label order.
///
/// Labels without voxels are skipped, so the output holds exactly one
/// record per label present in the volume.
#[must_use]
pub fn measure_objects(labels: &LabelVolume, count: usize) -> Vec<ObjectRecord> {
    let mut sums = vec![[0.0f64; 3]; count + 1];
    let mut areas = vec![0usize; count + 1];

    for ((z, x, y), &label) in labels.indexed_iter() {
        let label = label as usize;
        if label == 0 || label > count {
            continue;
        }
        let sum = &mut sums[label];
        sum[0] += z as f64;
        sum[1] += x as f64;
        sum[2] += y as f64;
        areas[label] += 1;
    }

    (1..=count)
        .filter(|&label| areas[label] > 0)
        .map(|label| {
            let area = areas[label] as f64;
            let [sz, sx, sy] = sums[label];
            ObjectRecord::new(label as u32, [sz / area, sx / area, sy / area], area)
        })
        .collect()
}

/// Largest label value in a volume.
#[must_use]
pub fn max_label(labels: &LabelVolume) -> usize {
    labels.iter().copied().max().unwrap_or(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_measure_objects() {
        let mut labels = LabelVolume::zeros((2, 4, 4));
        labels[[0, 0, 0]] = 1;
        labels[[0, 0, 1]] = 1;
        labels[[1, 3, 3]] = 2;

        let objects = measure_objects(&labels, 2);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].id.as_u32(), 1);
        assert_relative_eq!(objects[0].area, 2.0);
        assert_relative_eq!(objects[0].centroid[2], 0.5);
        assert_eq!(objects[1].centroid, [1.0, 3.0, 3.0]);
        assert_eq!(max_label(&labels), 2);
    }

    #[test]
    fn test_background_never_an_object() {
        let labels = LabelVolume::zeros((2, 2, 2));
        assert!(measure_objects(&labels, 0).is_empty());
    }
}

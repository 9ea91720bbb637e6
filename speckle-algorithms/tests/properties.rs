#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
use speckle_algorithms::{
    distance_matrix, distance_transform, filter_objects, label_mask, measure_objects,
    split_objects, Adjacency, QuantificationEngine,
};
use speckle_core::{
    Connectivity, MaskVolume, ObjectId, ObjectRecord, QuantificationConfig,
    SeedPolicy, Spacing,
};
use std::collections::BTreeSet;

/// Three blobs: a cube, an L-shaped bar and a single voxel.
fn blobs() -> MaskVolume {
    let mut mask = MaskVolume::from_elem((6, 12, 12), false);
    for z in 1..4 {
        for x in 1..4 {
            for y in 1..4 {
                mask[[z, x, y]] = true;
            }
        }
    }
    for x in 6..11 {
        mask[[2, x, 8]] = true;
    }
    for y in 8..11 {
        mask[[2, 10, y]] = true;
    }
    mask[[5, 0, 11]] = true;
    mask
}

fn records(points: &[([f64; 3], f64)]) -> Vec<ObjectRecord> {
    points
        .iter()
        .zip(1u32..)
        .map(|((centroid, area), id)| ObjectRecord::new(id, *centroid, *area))
        .collect()
}

#[test]
fn test_label_object_bijection() {
    let (labels, count) = label_mask(&blobs(), Connectivity::Full);
    assert_eq!(count, 3);
    let objects = measure_objects(&labels, count);

    let present: BTreeSet<u32> = labels.iter().copied().filter(|&l| l != 0).collect();
    let measured: BTreeSet<u32> = objects.iter().map(|o| o.id.as_u32()).collect();
    assert_eq!(present, measured);
    assert_eq!(objects.len(), measured.len());
    assert!(!measured.contains(&0));

    let total: f64 = objects.iter().map(|o| o.area).sum();
    assert_eq!(total as usize, blobs().iter().filter(|&&fg| fg).count());
}

#[test]
fn test_distance_zero_on_background() {
    let (labels, _) = label_mask(&blobs(), Connectivity::Full);
    let distance = distance_transform(&labels, Spacing::new(0.5, 0.0625, 0.0625));
    for (label, d) in labels.iter().zip(distance.iter()) {
        if *label == 0 {
            assert_eq!(*d, 0.0);
        } else {
            assert!(*d > 0.0);
        }
    }
}

#[test]
fn test_watershed_stays_inside_mask() {
    let (labels, count) = label_mask(&blobs(), Connectivity::Full);
    let distance = distance_transform(&labels, Spacing::default());
    for policy in [SeedPolicy::UnlabeledSeeds, SeedPolicy::LabeledSeeds] {
        let split = split_objects(&distance, &labels, policy).unwrap();
        assert!(split.objects.len() >= count);
        for ((seg, relabeled), label) in split
            .segmented
            .iter()
            .zip(split.relabeled.iter())
            .zip(labels.iter())
        {
            if *seg != 0 || *relabeled != 0 {
                assert_ne!(*label, 0);
            }
        }
    }
}

#[test]
fn test_relabeled_ids_contiguous() {
    let (labels, _) = label_mask(&blobs(), Connectivity::Full);
    let distance = distance_transform(&labels, Spacing::default());
    let split = split_objects(&distance, &labels, SeedPolicy::LabeledSeeds).unwrap();
    let ids: Vec<u32> = split.objects.iter().map(|o| o.id.as_u32()).collect();
    let expected: Vec<u32> = (1..=split.objects.len() as u32).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_filter_idempotent() {
    let objects = records(&[
        ([0.0; 3], 5.0),
        ([0.0; 3], 50.0),
        ([0.0; 3], 100.0),
        ([0.0; 3], 150.0),
        ([0.0; 3], f64::NAN),
    ]);
    let once = filter_objects(&objects, 5.0, 150.0);
    let twice = filter_objects(&once, 5.0, 150.0);
    assert_eq!(once, twice);
    assert_eq!(
        once.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![ObjectId(2), ObjectId(3)]
    );
}

#[test]
fn test_adjacency_matches_distances_exactly() {
    let a = records(&[([0.0; 3], 1.0), ([3.0, 4.0, 0.0], 1.0)]);
    let b = records(&[
        ([0.0, 0.0, 5.0], 1.0),
        ([0.0, 3.0, 4.0], 1.0),
        ([3.0, 4.0, 4.0], 1.0),
        ([9.0, 9.0, 9.0], 1.0),
    ]);
    let threshold = 5.0;
    let distances = distance_matrix(&a, &b);
    let adjacency = Adjacency::new(&a, &b, threshold);
    assert_eq!(adjacency.dim(), (2, 4));
    for i in 0..a.len() {
        for j in 0..b.len() {
            assert_eq!(adjacency.get(i, j), distances[[i, j]] < threshold);
        }
    }
    // Exactly on the radius is not adjacent.
    assert!(!adjacency.get(0, 0));
    assert!(!adjacency.get(0, 1));
}

fn scenario_engine() -> QuantificationEngine {
    let cells = records(&[([0.0, 0.0, 0.0], 100.0), ([0.0, 0.0, 100.0], 100.0)]);
    let puncta1 = records(&[
        ([0.0, 3.0, 4.0], 10.0),
        ([0.0, 0.0, -5.0], 10.0),
        ([0.0, 0.0, 150.0], 10.0),
    ]);
    let config = QuantificationConfig::new()
        .with_dist(10.0)
        .with_threshold(2.0)
        .with_puncta_range(1.0, 1000.0)
        .with_cell_range(1.0, 1000.0)
        .with_spacing(Spacing::isotropic(1.0));
    QuantificationEngine::new(config, &cells, &puncta1, &[]).unwrap()
}

#[test]
fn test_two_cell_scenario() {
    let engine = scenario_engine();
    let count = engine.count();
    assert_eq!(
        count.membership[&ObjectId(1)],
        vec![ObjectId(1), ObjectId(2)]
    );
    assert!(count.membership[&ObjectId(2)].is_empty());
    assert_eq!(count.counts, vec![2, 0]);

    let nonzero: Vec<usize> = count.counts.iter().copied().filter(|&c| c != 0).collect();
    assert_eq!(nonzero, vec![2]);

    let rows = engine.aggregates();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].puncta_count, 2);
    assert_eq!(rows[1].mean_volume, None);
}

#[test]
fn test_membership_sum_matches_near_puncta() {
    let engine = scenario_engine();
    let count = engine.count();
    let total: usize = count.counts.iter().sum();

    let near = engine
        .puncta1()
        .iter()
        .filter(|p| engine.cells().iter().any(|c| c.distance_to(p) < 10.0))
        .count();
    assert_eq!(total, near);
    assert_eq!(total, 2);
}

#[test]
fn test_coloc_skips_zero_denominator() {
    let cells = records(&[([0.0; 3], 100.0), ([0.0, 0.0, 100.0], 100.0)]);
    // Punctum 1 sits in cell 1 with a type-2 punctum on top; punctum 2
    // sits in cell 2 with no type-2 punctum anywhere near.
    let puncta1 = records(&[([0.0, 0.0, 1.0], 10.0), ([0.0, 0.0, 101.0], 10.0)]);
    let puncta2 = records(&[([0.0, 0.0, 1.5], 10.0)]);
    let config = QuantificationConfig::new()
        .with_dist(10.0)
        .with_threshold(2.0)
        .with_puncta_range(1.0, 1000.0)
        .with_cell_range(1.0, 1000.0);
    let engine = QuantificationEngine::new(config, &cells, &puncta1, &puncta2).unwrap();

    let coloc = engine.coloc();
    assert_eq!(coloc.ratios, vec![1.0]);
    assert!(coloc.ratios.iter().all(|r| r.is_finite()));
    assert!(!coloc.per_cell.contains_key(&ObjectId(2)));

    let overlap = engine.puncta_overlap();
    assert_eq!(overlap.len(), 1);
    assert!(overlap.contains_key(&ObjectId(1)));
}

#[test]
fn test_filtered_population_empty() {
    let cells = records(&[([0.0; 3], 100.0)]);
    let puncta = records(&[([0.0; 3], 5.0)]);
    let config = QuantificationConfig::new()
        .with_dist(10.0)
        .with_threshold(2.0)
        .with_puncta_range(10.0, 20.0)
        .with_cell_range(1.0, 1000.0);
    let engine = QuantificationEngine::new(config, &cells, &puncta, &puncta).unwrap();
    assert!(engine.puncta1().is_empty());
    assert_eq!(engine.count().counts, vec![0]);
    assert!(engine.volume().means.is_empty());
    assert!(engine.coloc().ratios.is_empty());
    assert!(engine.puncta_overlap().is_empty());
}

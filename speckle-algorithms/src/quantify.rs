//! Per-cell puncta quantification.
//!
//! Cells, puncta-type-1 and puncta-type-2 are area-filtered once when the
//! engine is built. Membership is "centroid within `dist`"; colocalization
//! compares a strict `threshold` radius against the `dist` radius.
#![allow(clippy::cast_precision_loss)]

use crate::spatial::{distance_matrix, filter_objects, Adjacency};
use log::{debug, warn};
use speckle_core::{ObjectId, ObjectRecord, QuantificationConfig, Result};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Puncta-type-1 membership per cell and the membership sizes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountResult {
    /// Cell id → ids of puncta-type-1 within `dist`, in id order.
    pub membership: BTreeMap<ObjectId, Vec<ObjectId>>,
    /// Puncta count per cell, in cell id order.
    pub counts: Vec<usize>,
}

/// Physical puncta volumes per cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeResult {
    /// Cell id → physical volumes of its member puncta.
    pub volumes: BTreeMap<ObjectId, Vec<f64>>,
    /// Mean member volume for every cell with at least one member.
    pub means: Vec<f64>,
}

/// Colocalization ratio per cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColocResult {
    /// Cell id → confirmed / candidate overlap ratio.
    pub per_cell: BTreeMap<ObjectId, f64>,
    /// The defined ratios, in cell id order.
    pub ratios: Vec<f64>,
}

/// Everything known about one cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellAggregate {
    /// Cell id.
    pub cell_id: ObjectId,
    /// Member puncta-type-1 ids.
    pub puncta: Vec<ObjectId>,
    /// Member count.
    pub puncta_count: usize,
    /// Mean physical puncta volume, `None` without members.
    pub mean_volume: Option<f64>,
    /// Colocalization ratio, `None` without candidate overlaps.
    pub coloc: Option<f64>,
}

/// Population-level averages.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuantificationSummary {
    /// Number of cells that passed the area filter.
    pub cells: usize,
    /// Mean puncta count per cell.
    pub mean_count: Option<f64>,
    /// Mean of the per-cell mean puncta volumes.
    pub mean_volume: Option<f64>,
    /// Mean of the per-cell colocalization ratios.
    pub mean_coloc: Option<f64>,
}

impl fmt::Display for QuantificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: Option<f64>) -> String {
            value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
        }
        writeln!(f, "{} cells", self.cells)?;
        writeln!(f, "average puncta count per cell: {}", show(self.mean_count))?;
        writeln!(f, "average puncta volume per cell: {}", show(self.mean_volume))?;
        write!(f, "colocalization: {}", show(self.mean_coloc))
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantifies puncta against cells.
#[derive(Debug, Clone)]
pub struct QuantificationEngine {
    config: QuantificationConfig,
    cells: Vec<ObjectRecord>,
    puncta1: Vec<ObjectRecord>,
    puncta2: Vec<ObjectRecord>,
}

impl QuantificationEngine {
    /// Filters the three populations and builds the engine.
    ///
    /// Puncta-type-2 objects use the puncta area bounds.
    ///
    /// # Errors
    /// Returns a configuration error when the configuration is invalid.
    pub fn new(
        config: QuantificationConfig,
        cells: &[ObjectRecord],
        puncta1: &[ObjectRecord],
        puncta2: &[ObjectRecord],
    ) -> Result<Self> {
        config.validate()?;

        let cells_kept = filter_objects(cells, config.cell_min, config.cell_max);
        let puncta1_kept = filter_objects(puncta1, config.puncta_min, config.puncta_max);
        let puncta2_kept = filter_objects(puncta2, config.puncta_min, config.puncta_max);

        for (name, before, after) in [
            ("cells", cells.len(), cells_kept.len()),
            ("puncta1", puncta1.len(), puncta1_kept.len()),
            ("puncta2", puncta2.len(), puncta2_kept.len()),
        ] {
            debug!("{name}: kept {after} of {before} after area filter");
            if after == 0 {
                warn!("{name}: area filter removed every object");
            }
        }

        Ok(Self {
            config,
            cells: cells_kept,
            puncta1: puncta1_kept,
            puncta2: puncta2_kept,
        })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &QuantificationConfig {
        &self.config
    }

    /// Filtered cells.
    #[must_use]
    pub fn cells(&self) -> &[ObjectRecord] {
        &self.cells
    }

    /// Filtered puncta-type-1 objects.
    #[must_use]
    pub fn puncta1(&self) -> &[ObjectRecord] {
        &self.puncta1
    }

    /// Filtered puncta-type-2 objects.
    #[must_use]
    pub fn puncta2(&self) -> &[ObjectRecord] {
        &self.puncta2
    }

    /// Puncta-type-1 indices per cell, in cell order.
    fn member_indices(&self) -> Vec<Vec<usize>> {
        let adjacency = Adjacency::new(&self.cells, &self.puncta1, self.config.dist);
        (0..self.cells.len())
            .map(|i| adjacency.row_neighbors(i).collect())
            .collect()
    }

    /// Puncta-type-1 membership per cell.
    #[must_use]
    pub fn count(&self) -> CountResult {
        let members = self.member_indices();
        let counts = members.iter().map(Vec::len).collect();
        let membership = self
            .cells
            .iter()
            .zip(&members)
            .map(|(cell, indices)| {
                (
                    cell.id,
                    indices.iter().map(|&j| self.puncta1[j].id).collect(),
                )
            })
            .collect();
        CountResult { membership, counts }
    }

    /// Physical volumes of member puncta per cell.
    #[must_use]
    pub fn volume(&self) -> VolumeResult {
        let scale = self.config.spacing.voxel_volume();
        let mut result = VolumeResult::default();
        for (cell, indices) in self.cells.iter().zip(self.member_indices()) {
            let volumes: Vec<f64> = indices
                .iter()
                .map(|&j| self.puncta1[j].area * scale)
                .collect();
            if let Some(mean) = mean(&volumes) {
                result.means.push(mean);
            }
            result.volumes.insert(cell.id, volumes);
        }
        result
    }

    /// Candidate and confirmed overlap adjacencies of puncta-type-1
    /// against puncta-type-2.
    fn overlap_adjacencies(&self) -> (Adjacency, Adjacency) {
        let distances = distance_matrix(&self.puncta1, &self.puncta2);
        let candidate =
            Adjacency::from_distances(&self.puncta1, &self.puncta2, &distances, self.config.dist);
        let confirmed = Adjacency::from_distances(
            &self.puncta1,
            &self.puncta2,
            &distances,
            self.config.threshold,
        );
        (candidate, confirmed)
    }

    /// Fraction of each cell's overlapping puncta-type-1 that overlap
    /// within the strict threshold.
    ///
    /// For every member, at most one puncta-type-2 match counts. Cells with
    /// no candidate overlap are left out.
    #[must_use]
    pub fn coloc(&self) -> ColocResult {
        let (candidate, confirmed) = self.overlap_adjacencies();
        let mut result = ColocResult::default();
        for (cell, indices) in self.cells.iter().zip(self.member_indices()) {
            let candidates = indices
                .iter()
                .filter(|&&j| candidate.first_match(j).is_some())
                .count();
            if candidates == 0 {
                continue;
            }
            let confirmations = indices
                .iter()
                .filter(|&&j| confirmed.first_match(j).is_some())
                .count();
            let ratio = confirmations as f64 / candidates as f64;
            result.per_cell.insert(cell.id, ratio);
            result.ratios.push(ratio);
        }
        result
    }

    /// Per puncta-type-1 overlap ratio for puncta inside some cell:
    /// puncta-type-2 within `threshold` over puncta-type-2 within `dist`.
    ///
    /// Puncta without any puncta-type-2 within `dist` are left out.
    #[must_use]
    pub fn puncta_overlap(&self) -> BTreeMap<ObjectId, f64> {
        let (candidate, confirmed) = self.overlap_adjacencies();
        let mut in_cell = vec![false; self.puncta1.len()];
        for j in self.member_indices().into_iter().flatten() {
            in_cell[j] = true;
        }
        self.puncta1
            .iter()
            .enumerate()
            .filter(|(j, _)| in_cell[*j])
            .filter_map(|(j, punctum)| {
                let denominator = candidate.row_count(j);
                (denominator > 0).then(|| {
                    (
                        punctum.id,
                        confirmed.row_count(j) as f64 / denominator as f64,
                    )
                })
            })
            .collect()
    }

    /// One aggregate per filtered cell, in id order.
    #[must_use]
    pub fn aggregates(&self) -> Vec<CellAggregate> {
        let count = self.count();
        let volume = self.volume();
        let coloc = self.coloc();
        count
            .membership
            .into_iter()
            .map(|(cell_id, puncta)| {
                let mean_volume = volume.volumes.get(&cell_id).and_then(|v| mean(v));
                CellAggregate {
                    cell_id,
                    puncta_count: puncta.len(),
                    puncta,
                    mean_volume,
                    coloc: coloc.per_cell.get(&cell_id).copied(),
                }
            })
            .collect()
    }

    /// Id-keyed rows for cells with at least one member punctum.
    #[must_use]
    pub fn cell_table(&self) -> Vec<CellAggregate> {
        self.aggregates()
            .into_iter()
            .filter(|row| row.puncta_count > 0)
            .collect()
    }

    /// Population averages.
    #[must_use]
    pub fn summary(&self) -> QuantificationSummary {
        let counts: Vec<f64> = self.count().counts.iter().map(|&c| c as f64).collect();
        QuantificationSummary {
            cells: self.cells.len(),
            mean_count: mean(&counts),
            mean_volume: mean(&self.volume().means),
            mean_coloc: mean(&self.coloc().ratios),
        }
    }
}

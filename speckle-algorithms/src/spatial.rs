//! Area filtering and centroid distance matrices.

use ndarray::{Array2, Zip};
use speckle_core::object::euclidean;
use speckle_core::{ObjectId, ObjectRecord};

/// Keeps objects with `min < area < max`.
///
/// Objects with a NaN or infinite area are dropped. Ids stay attached to
/// their records, so filtering never renumbers anything.
#[must_use]
pub fn filter_objects(objects: &[ObjectRecord], min: f64, max: f64) -> Vec<ObjectRecord> {
    objects
        .iter()
        .filter(|object| object.area.is_finite() && object.area > min && object.area < max)
        .copied()
        .collect()
}

/// Pairwise centroid distances, rows = `a`, columns = `b`.
#[must_use]
pub fn distance_matrix(a: &[ObjectRecord], b: &[ObjectRecord]) -> Array2<f64> {
    let mut distances = Array2::<f64>::zeros((a.len(), b.len()));
    Zip::indexed(&mut distances).par_for_each(|(i, j), d| {
        *d = euclidean(&a[i].centroid, &b[j].centroid);
    });
    distances
}

/// Boolean adjacency between two object sets: `true` where the centroid
/// distance is strictly below a radius.
#[derive(Debug, Clone)]
pub struct Adjacency {
    rows: Vec<ObjectId>,
    cols: Vec<ObjectId>,
    matrix: Array2<bool>,
}

impl Adjacency {
    /// Builds the adjacency of `a` against `b` at `radius`.
    #[must_use]
    pub fn new(a: &[ObjectRecord], b: &[ObjectRecord], radius: f64) -> Self {
        Self::from_distances(a, b, &distance_matrix(a, b), radius)
    }

    /// Thresholds a precomputed distance matrix of `a` against `b`.
    #[must_use]
    pub fn from_distances(
        a: &[ObjectRecord],
        b: &[ObjectRecord],
        distances: &Array2<f64>,
        radius: f64,
    ) -> Self {
        Self {
            rows: a.iter().map(|object| object.id).collect(),
            cols: b.iter().map(|object| object.id).collect(),
            matrix: distances.mapv(|d| d < radius),
        }
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.matrix.dim()
    }

    /// Whether row `i` is adjacent to column `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.matrix[[i, j]]
    }

    /// Column indices adjacent to row `i`, in column order.
    pub fn row_neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.matrix
            .row(i)
            .into_iter()
            .enumerate()
            .filter_map(|(j, &hit)| hit.then_some(j))
    }

    /// Number of columns adjacent to row `i`.
    #[must_use]
    pub fn row_count(&self, i: usize) -> usize {
        self.matrix.row(i).iter().filter(|&&hit| hit).count()
    }

    /// First column adjacent to row `i`, if any.
    #[must_use]
    pub fn first_match(&self, i: usize) -> Option<usize> {
        self.row_neighbors(i).next()
    }

    /// Row ids.
    #[must_use]
    pub fn row_ids(&self) -> &[ObjectId] {
        &self.rows
    }

    /// Column ids.
    #[must_use]
    pub fn col_ids(&self) -> &[ObjectId] {
        &self.cols
    }

    /// The raw boolean matrix.
    #[must_use]
    pub fn matrix(&self) -> &Array2<bool> {
        &self.matrix
    }
}

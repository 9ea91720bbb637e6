//! Segmented object records.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a segmented object.
///
/// The id is the object's value in the final relabeled volume and stays
/// attached to the object through filtering and quantification, so
/// positions in filtered collections never stand in for identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Returns the raw label value.
    #[inline]
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One segmented object: centroid in voxel coordinates and area.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectRecord {
    /// Object identity.
    pub id: ObjectId,
    /// Mean voxel coordinate in array axis order.
    pub centroid: [f64; 3],
    /// Voxel count.
    pub area: f64,
}

impl ObjectRecord {
    /// Creates a new object record.
    #[must_use]
    pub fn new(id: u32, centroid: [f64; 3], area: f64) -> Self {
        Self {
            id: ObjectId(id),
            centroid,
            area,
        }
    }

    /// Euclidean distance between two centroids, in voxel units.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        euclidean(&self.centroid, &other.centroid)
    }
}

/// Euclidean distance between two 3-D points.
#[inline]
#[must_use]
pub fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

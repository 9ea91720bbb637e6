//! speckle-algorithms: Segmentation and quantification algorithms.
//!
//! This crate provides the volume pipeline and the spatial statistics:
//! - **Filters** - Gaussian, 3×3×3 median, Sobel magnitude
//! - **Threshold** - Li minimum cross-entropy
//! - **Morphology** - hole filling, isotropic erosion/dilation, size pruning
//! - **Labeling** - union-find connected components
//! - **Distance** - anisotropic exact Euclidean distance transform
//! - **Watershed** - marker-controlled priority flood
//! - **Quantify** - per-cell membership, volume and colocalization
//!
#![warn(missing_docs)]

pub mod distance;
pub mod filters;
pub mod labeling;
pub mod morphology;
mod neighborhood;
pub mod quantify;
pub mod regions;
pub mod segmentation;
pub mod spatial;
pub mod threshold;
pub mod watershed;

pub use distance::{distance_transform, euclidean_distance_transform};
pub use labeling::{label_mask, relabel};
pub use quantify::{
    CellAggregate, ColocResult, CountResult, QuantificationEngine, QuantificationSummary,
    VolumeResult,
};
pub use regions::measure_objects;
pub use segmentation::{segment, segment_channel, split_objects, ChannelSegmentation, Segmentation};
pub use spatial::{distance_matrix, filter_objects, Adjacency};
pub use threshold::li_threshold;
pub use watershed::watershed;

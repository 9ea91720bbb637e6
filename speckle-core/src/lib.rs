//! speckle-core: Core types for 3-D puncta segmentation and quantification.
//!
//! This crate provides the volume containers, object records and
//! configuration structs shared by the segmentation and quantification
//! stages.
//!

pub mod config;
pub mod error;
pub mod object;
pub mod volume;

pub use config::{
    ChannelKind, Connectivity, QuantificationConfig, SeedPolicy, SegmentationConfig,
};
pub use error::{Error, Result};
pub use object::{ObjectId, ObjectRecord};
pub use volume::{DistanceVolume, LabelVolume, MaskVolume, Spacing, VoxelVolume};

//! speckle-io: TIFF stack loading and result export for speckle.
//!
//! Stacks are memory-mapped via memmap2 and decoded page by page with the
//! `tiff` crate. Results are written as CSV tables and label volumes as
//! multi-page TIFF.

mod error;
pub mod loader;
pub mod writer;

pub use error::{Error, Result};
pub use loader::{ChannelLayout, StackInfo, VolumeLoader};
pub use writer::{write_label_stack, ResultWriter};

//! Memory-mapped multi-page TIFF stack loader.
//!
//! A stack is read either as [`ChannelLayout::Interleaved`] (one page per
//! z-slice, channels stored as samples) or as [`ChannelLayout::Planar`]
//! (one page per channel and z-slice, page index `z * channels + c`).
#![allow(clippy::cast_precision_loss)]

use crate::{Error, Result};
use log::{debug, info};
use memmap2::Mmap;
use ndarray::Array3;
use speckle_core::{Spacing, VoxelVolume};
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How channels are arranged across TIFF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelLayout {
    /// Each page is one z-slice holding every channel as a sample.
    #[default]
    Interleaved,
    /// Pages cycle through channels: page `z * channels + c`.
    Planar {
        /// Number of channels per z-slice.
        channels: usize,
    },
}

/// Geometry of a TIFF stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackInfo {
    /// Number of pages in the file.
    pub pages: usize,
    /// Rows per page.
    pub height: usize,
    /// Columns per page.
    pub width: usize,
    /// Samples per pixel of the first page.
    pub samples_per_pixel: usize,
    /// Layout used to interpret the pages.
    pub layout: ChannelLayout,
}

impl StackInfo {
    /// Number of channels under the configured layout.
    #[must_use]
    pub fn channels(&self) -> usize {
        match self.layout {
            ChannelLayout::Interleaved => self.samples_per_pixel,
            ChannelLayout::Planar { channels } => channels,
        }
    }

    /// Number of z-slices under the configured layout.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self.layout {
            ChannelLayout::Interleaved => self.pages,
            ChannelLayout::Planar { channels } => self.pages / channels.max(1),
        }
    }

    /// Volume shape `[z, x, y]` of a single channel.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        [self.depth(), self.height, self.width]
    }
}

impl fmt::Display for StackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page(s) of {}x{} with {} sample(s) per pixel; {:?}: {} channel(s) x {} slice(s)",
            self.pages,
            self.height,
            self.width,
            self.samples_per_pixel,
            self.layout,
            self.channels(),
            self.depth()
        )
    }
}

/// Reader for multi-channel 3-D TIFF stacks.
pub struct VolumeLoader {
    mmap: Mmap,
    path: PathBuf,
    layout: ChannelLayout,
}

impl VolumeLoader {
    /// Memory-maps a TIFF stack.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped, or
    /// if a planar layout declares zero channels.
    pub fn open<P: AsRef<Path>>(path: P, layout: ChannelLayout) -> Result<Self> {
        if layout == (ChannelLayout::Planar { channels: 0 }) {
            return Err(Error::InvalidFormat(
                "planar layout needs at least one channel".to_string(),
            ));
        }
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
            layout,
        })
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Channel layout used by this loader.
    #[must_use]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn decoder(&self) -> Result<Decoder<Cursor<&[u8]>>> {
        let decoder = Decoder::new(Cursor::new(&self.mmap[..]))?.with_limits(Limits::unlimited());
        Ok(decoder)
    }

    /// Reads the stack geometry without decoding pixel data.
    ///
    /// # Errors
    /// Returns an error if the file is not a readable TIFF, the pages differ
    /// in size, or the page count does not match a planar layout.
    pub fn info(&self) -> Result<StackInfo> {
        let mut decoder = self.decoder()?;
        let (width, height) = decoder.dimensions()?;
        let samples_per_pixel = samples_per_pixel(decoder.colortype()?)?;

        let mut pages = 1;
        while decoder.more_images() {
            decoder.next_image()?;
            if decoder.dimensions()? != (width, height) {
                return Err(Error::InvalidFormat(format!(
                    "page {pages} is {:?}, expected {:?}",
                    decoder.dimensions()?,
                    (width, height)
                )));
            }
            pages += 1;
        }

        if let ChannelLayout::Planar { channels } = self.layout {
            if pages % channels != 0 {
                return Err(Error::InvalidFormat(format!(
                    "{pages} page(s) cannot be split into {channels} channel(s)"
                )));
            }
        }

        Ok(StackInfo {
            pages,
            height: height as usize,
            width: width as usize,
            samples_per_pixel,
            layout: self.layout,
        })
    }

    /// Decodes one channel into a [`VoxelVolume`] with the given spacing.
    ///
    /// # Errors
    /// Returns [`Error::ChannelOutOfRange`] for a missing channel, and
    /// decoding or format errors for unreadable pages.
    pub fn load_channel(&self, channel: usize, spacing: Spacing) -> Result<VoxelVolume> {
        let info = self.info()?;
        let channels = info.channels();
        if channel >= channels {
            return Err(Error::ChannelOutOfRange { channel, channels });
        }

        let [depth, height, width] = info.shape();
        let mut data = Array3::<f64>::zeros((depth, height, width));
        let mut decoder = self.decoder()?;

        for page in 0..info.pages {
            if page > 0 {
                decoder.next_image()?;
            }
            let (z, sample) = match self.layout {
                ChannelLayout::Interleaved => (page, channel),
                ChannelLayout::Planar { channels } => {
                    if page % channels != channel {
                        continue;
                    }
                    (page / channels, 0)
                }
            };

            let samples = to_f64(decoder.read_image()?)?;
            let per_pixel = samples.len() / (height * width).max(1);
            if per_pixel * height * width != samples.len() || sample >= per_pixel {
                return Err(Error::InvalidFormat(format!(
                    "page {page} holds {} sample(s) for a {height}x{width} image",
                    samples.len()
                )));
            }

            let mut slice = data.index_axis_mut(ndarray::Axis(0), z);
            for (dst, src) in slice
                .iter_mut()
                .zip(samples.iter().skip(sample).step_by(per_pixel))
            {
                *dst = *src;
            }
            debug!("page {page} -> slice {z}");
        }

        let volume = VoxelVolume::new(data, spacing)?;
        info!(
            "loaded channel {channel} of {}: {volume}",
            self.path.display()
        );
        Ok(volume)
    }
}

/// Samples per pixel for the colour types a microscope stack can carry.
fn samples_per_pixel(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        ColorType::Multiband { num_samples, .. } => Ok(usize::from(num_samples)),
        other => Err(Error::InvalidFormat(format!(
            "unsupported colour type {other:?}"
        ))),
    }
}

fn to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let samples = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(Error::InvalidFormat(
                "unsupported sample format".to_string(),
            ))
        }
    };
    Ok(samples)
}

//! speckle CLI: segment and quantify puncta in 3-D fluorescence stacks.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines,
    clippy::needless_pass_by_value
)]

mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::AnalysisConfig;
use log::info;
use serde::Serialize;
use speckle_algorithms::{segment, CellAggregate, QuantificationEngine, QuantificationSummary};
use speckle_core::{ChannelKind, SegmentationConfig};
use speckle_io::{write_label_stack, ChannelLayout, ResultWriter, VolumeLoader};
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SpeckleIo(#[from] speckle_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] speckle_core::Error),

    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Page layout of the input stack.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    /// One page per z-slice, channels as samples
    Interleaved,
    /// One page per channel and z-slice (ImageJ hyperstack order)
    Planar,
}

/// Channel content.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// Cell bodies
    Cell,
    /// Small puncta
    Puncta,
}

impl From<Kind> for ChannelKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Cell => ChannelKind::Cell,
            Kind::Puncta => ChannelKind::Puncta,
        }
    }
}

/// Puncta segmentation and per-cell quantification for 3-D microscopy stacks.
#[derive(Parser)]
#[command(name = "speckle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment all three channels and quantify puncta per cell
    Analyze {
        /// Input TIFF stack
        input: PathBuf,

        /// Output path prefix
        #[arg(short, long)]
        output: PathBuf,

        /// JSON analysis configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Page layout, overriding the configuration
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Channels per slice for the planar layout
        #[arg(long, default_value = "3")]
        channels: usize,

        /// Directory for relabeled volumes as TIFF stacks
        #[arg(long)]
        labels_dir: Option<PathBuf>,

        /// Write a JSON summary to this file
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Show information about a TIFF stack
    Info {
        /// Input TIFF stack
        input: PathBuf,

        /// Page layout
        #[arg(long, value_enum, default_value = "interleaved")]
        layout: Layout,

        /// Channels per slice for the planar layout
        #[arg(long, default_value = "3")]
        channels: usize,

        /// Decode every channel and print its intensity range
        #[arg(long)]
        stats: bool,
    },

    /// Segment a single channel
    Segment {
        /// Input TIFF stack
        input: PathBuf,

        /// Channel index
        #[arg(long)]
        channel: usize,

        /// Channel content
        #[arg(long, value_enum)]
        kind: Kind,

        /// Gaussian sigma in voxels (default depends on kind)
        #[arg(long)]
        sigma: Option<f64>,

        /// Morphology width in voxels (default depends on kind)
        #[arg(long)]
        width: Option<u32>,

        /// JSON analysis configuration (spacing and layout)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Page layout, overriding the configuration
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Channels per slice for the planar layout
        #[arg(long, default_value = "3")]
        channels: usize,

        /// Object table CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Relabeled volume as a TIFF stack
        #[arg(long)]
        labels: Option<PathBuf>,
    },
}

/// JSON report of an `analyze` run.
#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    config: &'a AnalysisConfig,
    summary: &'a QuantificationSummary,
    cells: &'a [CellAggregate],
}

fn channel_layout(layout: Layout, channels: usize) -> ChannelLayout {
    match layout {
        Layout::Interleaved => ChannelLayout::Interleaved,
        Layout::Planar => ChannelLayout::Planar { channels },
    }
}

fn load_config(path: Option<&Path>, layout: Option<Layout>, channels: usize) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(layout) = layout {
        config.layout = channel_layout(layout, channels);
    }
    Ok(config)
}

/// Appends `suffix` to the file name of `prefix`.
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            layout,
            channels,
            labels_dir,
            summary_json,
        } => {
            // Analysis pipeline:
            // 1. Load the three channels from the memory-mapped stack
            // 2. Segment them in parallel
            // 3. Filter objects and quantify puncta per cell
            // 4. Write tables, label stacks and the summary
            let config = load_config(config.as_deref(), layout, channels)?;
            let start = Instant::now();

            let loader = VolumeLoader::open(&input, config.layout)?;
            info!("{}", loader.info()?);
            let spacing = config.voxel_spacing()?;

            let cell_config = config.segmentation(ChannelKind::Cell, config.cells)?;
            let puncta1_config = config.segmentation(ChannelKind::Puncta, config.puncta1)?;
            let puncta2_config = config.segmentation(ChannelKind::Puncta, config.puncta2)?;

            let cell_volume = loader.load_channel(config.cells.channel, spacing)?;
            let puncta1_volume = loader.load_channel(config.puncta1.channel, spacing)?;
            let puncta2_volume = loader.load_channel(config.puncta2.channel, spacing)?;

            let (cells, (puncta1, puncta2)) = rayon::join(
                || segment(&cell_volume, &cell_config),
                || {
                    rayon::join(
                        || segment(&puncta1_volume, &puncta1_config),
                        || segment(&puncta2_volume, &puncta2_config),
                    )
                },
            );
            let (cells, puncta1, puncta2) = (cells?, puncta1?, puncta2?);
            info!(
                "segmented in {:.2}s: {} cell(s), {} + {} puncta",
                start.elapsed().as_secs_f64(),
                cells.objects().len(),
                puncta1.objects().len(),
                puncta2.objects().len()
            );

            let engine = QuantificationEngine::new(
                config.quantification()?,
                cells.objects(),
                puncta1.objects(),
                puncta2.objects(),
            )?;

            let counts: Vec<usize> = engine
                .count()
                .counts
                .into_iter()
                .filter(|&c| c != 0)
                .collect();
            ResultWriter::create(with_suffix(&output, ".csv"))?.write_averages_csv(
                &counts,
                &engine.volume().means,
                &engine.coloc().ratios,
            )?;

            let table = engine.cell_table();
            ResultWriter::create(with_suffix(&output, "_cells.csv"))?
                .write_cell_table_csv(&table)?;

            if let Some(dir) = &labels_dir {
                std::fs::create_dir_all(dir)?;
            }
            for (name, run) in [("cells", &cells), ("puncta1", &puncta1), ("puncta2", &puncta2)] {
                ResultWriter::create(with_suffix(&output, &format!("_{name}_objects.csv")))?
                    .write_objects_csv(run.objects())?;
                if let Some(dir) = &labels_dir {
                    write_label_stack(dir.join(format!("{name}.tif")), run.relabeled())?;
                }
            }

            let summary = engine.summary();
            if let Some(path) = summary_json {
                let report = Report {
                    input: &input,
                    config: &config,
                    summary: &summary,
                    cells: &table,
                };
                serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &report)?;
            }

            println!("{summary}");
            println!(
                "Analyzed {} in {:.2}s",
                input.display(),
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Info {
            input,
            layout,
            channels,
            stats,
        } => {
            let loader = VolumeLoader::open(&input, channel_layout(layout, channels))?;
            let stack = loader.info()?;

            println!("File: {}", input.display());
            println!("Pages: {}", stack.pages);
            println!("Page size: {} x {}", stack.height, stack.width);
            println!("Samples per pixel: {}", stack.samples_per_pixel);
            println!("Channels: {}", stack.channels());
            println!("Slices: {}", stack.depth());

            if stats {
                let spacing = AnalysisConfig::default().voxel_spacing()?;
                for channel in 0..stack.channels() {
                    let volume = loader.load_channel(channel, spacing)?;
                    let (min, max) = volume.range();
                    println!("Channel {}: range {} - {}", channel, min, max);
                }
            }
        }

        Commands::Segment {
            input,
            channel,
            kind,
            sigma,
            width,
            config,
            layout,
            channels,
            output,
            labels,
        } => {
            let config = load_config(config.as_deref(), layout, channels)?;
            let start = Instant::now();

            let spacing = config.voxel_spacing()?;
            let kind = ChannelKind::from(kind);
            let defaults = match kind {
                ChannelKind::Cell => SegmentationConfig::cells(spacing),
                ChannelKind::Puncta => SegmentationConfig::puncta(spacing),
            };
            let segmentation = SegmentationConfig::new(
                kind,
                sigma.unwrap_or(defaults.sigma),
                width.unwrap_or(defaults.width),
                spacing,
            );

            let loader = VolumeLoader::open(&input, config.layout)?;
            let volume = loader.load_channel(channel, spacing)?;
            let run = segment(&volume, &segmentation)?;

            ResultWriter::create(&output)?.write_objects_csv(run.objects())?;
            if let Some(path) = labels {
                write_label_stack(path, run.relabeled())?;
            }

            println!(
                "Segmented channel {} ({:?}) in {:.2}s",
                channel,
                segmentation.kind,
                start.elapsed().as_secs_f64()
            );
            println!("Objects: {}", run.objects().len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix_appends_to_file_name() {
        assert_eq!(
            with_suffix(Path::new("out/run1"), "_cells.csv"),
            PathBuf::from("out/run1_cells.csv")
        );
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "speckle",
            "analyze",
            "stack.tif",
            "--output",
            "out/run",
            "--layout",
            "planar",
            "--channels",
            "4",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Analyze {
                layout, channels, ..
            } => {
                let layout = channel_layout(layout.unwrap(), channels);
                assert_eq!(layout, ChannelLayout::Planar { channels: 4 });
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_load_config_default_layout() {
        let config = load_config(None, None, 3).unwrap();
        assert_eq!(config.layout, ChannelLayout::Interleaved);
    }
}

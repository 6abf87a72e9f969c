use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;
use mosaic_core::align::AggregationMode;
use mosaic_core::consts::{
    DEFAULT_MAX_DX, DEFAULT_MAX_DY, DEFAULT_MAX_DZ, DEFAULT_OVERLAP_H, DEFAULT_OVERLAP_V,
    DEFAULT_PREFETCH_THREADS, DEFAULT_Z_SAMPLES, DEFAULT_Z_STRIDE,
};
use mosaic_core::pipeline::{stitch_alignment, AlignConfig};

use crate::progress::ConsoleReporter;

#[derive(Args)]
pub struct AlignArgs {
    /// Tile index TOML file
    pub index: PathBuf,

    /// Channel to correlate for multi-channel tiles
    #[arg(short, long)]
    pub channel: Option<usize>,

    /// Maximum allowed shift along Z (frames)
    #[arg(long, default_value_t = DEFAULT_MAX_DZ)]
    pub max_dz: usize,

    /// Maximum allowed shift along the stitching axis (px)
    #[arg(long, default_value_t = DEFAULT_MAX_DY)]
    pub max_dy: usize,

    /// Maximum allowed lateral shift (px)
    #[arg(long, default_value_t = DEFAULT_MAX_DX)]
    pub max_dx: usize,

    /// Nominal overlap along the vertical stitching axis (px)
    #[arg(long, default_value_t = DEFAULT_OVERLAP_V)]
    pub overlap_v: usize,

    /// Nominal overlap along the horizontal stitching axis (px)
    #[arg(long, default_value_t = DEFAULT_OVERLAP_H)]
    pub overlap_h: usize,

    /// Number of correlation samples to take along Z per tile pair
    #[arg(long, default_value_t = DEFAULT_Z_SAMPLES)]
    pub z_samples: usize,

    /// Stride between Z samples (frames)
    #[arg(long, default_value_t = DEFAULT_Z_STRIDE)]
    pub z_stride: usize,

    /// Average measurements weighted by score instead of keeping the best
    #[arg(short = 'a', long)]
    pub average: bool,

    /// Correlation worker threads (0 = all cores)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub workers: usize,

    /// I/O prefetch threads
    #[arg(long, default_value_t = DEFAULT_PREFETCH_THREADS)]
    pub prefetch: usize,

    /// Allow tiles of differing frame shapes
    #[arg(long)]
    pub unequal_shape: bool,

    /// Output file for the pairwise shift records
    #[arg(short, long, default_value = "stitch.json")]
    pub output: PathBuf,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()?;
    }

    let grid = super::load_grid(&args.index)?;
    let reader = super::reader_for(&args.index);

    let config = AlignConfig {
        channel: args.channel,
        max_dz: args.max_dz,
        max_dy: args.max_dy,
        max_dx: args.max_dx,
        overlap_v: args.overlap_v,
        overlap_h: args.overlap_h,
        z_samples: args.z_samples,
        z_stride: args.z_stride,
        mode: if args.average {
            AggregationMode::WeightedAverage
        } else {
            AggregationMode::BestScore
        },
        workers: args.workers,
        prefetch: args.prefetch,
        equal_shape: !args.unequal_shape,
    };

    let reporter = ConsoleReporter::new();
    let results = stitch_alignment(&reader, &grid, &config, &reporter)?;

    let header = Style::new().cyan().bold();
    println!(
        "{}",
        header.apply_to(format!(
            "{:<24} {:<24} {:>4} {:>8} {:>8} {:>8} {:>7}",
            "a", "b", "axis", "dz", "dy", "dx", "score"
        ))
    );
    for r in &results {
        println!(
            "{:<24} {:<24} {:>4} {:>8.1} {:>8.1} {:>8.1} {:>7.3}",
            r.a, r.b, r.axis, r.dz, r.dy, r.dx, r.score
        );
    }

    serde_json::to_writer_pretty(File::create(&args.output)?, &results)?;
    println!("Wrote {} pair records to {}", results.len(), args.output.display());
    Ok(())
}

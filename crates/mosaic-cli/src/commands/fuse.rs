use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mosaic_core::io::raw::write_volume;
use mosaic_core::mask::MaskCache;
use mosaic_core::pipeline::{run_fusion, FuseConfig, ProgressReporter, StitchStage};
use serde::Serialize;

use crate::progress::ConsoleReporter;

#[derive(Args)]
pub struct FuseArgs {
    /// Tile index TOML file
    pub index: PathBuf,

    /// Output raw f32 volume
    #[arg(short, long, default_value = "fused.raw")]
    pub output: PathBuf,

    /// Channel to fuse for multi-channel tiles
    #[arg(short, long)]
    pub channel: Option<usize>,

    /// Saturate tile edges in the output to inspect placement
    #[arg(long)]
    pub debug_borders: bool,
}

/// Sidecar describing the otherwise headerless output volume.
#[derive(Serialize)]
struct VolumeMeta {
    shape: [usize; 3],
    dtype: &'static str,
}

pub fn run(args: &FuseArgs) -> Result<()> {
    let grid = super::load_grid(&args.index)?;
    let reader = super::reader_for(&args.index);

    let config = FuseConfig {
        channel: args.channel,
        debug_borders: args.debug_borders,
    };
    let masks = MaskCache::new();
    let reporter = ConsoleReporter::new();

    let volume = run_fusion(&reader, &grid, &config, &masks, &reporter)?;

    reporter.begin_stage(StitchStage::Writing, None);
    write_volume(&args.output, &volume)
        .with_context(|| format!("writing {}", args.output.display()))?;

    let (nz, ny, nx) = volume.dim();
    let meta = VolumeMeta {
        shape: [nz, ny, nx],
        dtype: "f32le",
    };
    let meta_path = args.output.with_extension("toml");
    std::fs::write(&meta_path, toml::to_string_pretty(&meta)?)
        .with_context(|| format!("writing {}", meta_path.display()))?;
    reporter.finish_stage();

    println!(
        "Fused {} tiles into {} ({}x{}x{} f32)",
        grid.tiles.len(),
        args.output.display(),
        nz,
        ny,
        nx
    );
    Ok(())
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Tile index TOML file
    pub index: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let grid = super::load_grid(&args.index)?;

    let first = &grid.tiles[0];
    let equal_shape = grid.validate_equal_shape().is_ok();
    let (nz, ny, nx) = grid.output_shape();
    let pairs_y: usize = grid
        .tiles_along_y()
        .iter()
        .map(|g| g.len().saturating_sub(1))
        .sum();
    let pairs_x: usize = grid
        .tiles_along_x()
        .iter()
        .map(|g| g.len().saturating_sub(1))
        .sum();

    println!("Index:         {}", args.index.display());
    println!("Tiles:         {}", grid.tiles.len());
    if equal_shape {
        println!("Frame shape:   {}x{}", first.xsize, first.ysize);
    } else {
        println!("Frame shape:   mixed");
    }
    println!("Frames:        {}", first.nfrms);
    println!("Channels:      {}", first.channels);
    println!("Pixel type:    {:?}", first.pixel_type);
    println!("Output shape:  {}x{}x{} (ZxYxX)", nz, ny, nx);
    println!("Pairs along Y: {}", pairs_y);
    println!("Pairs along X: {}", pairs_x);

    let frame_bytes = first.ysize * first.xsize * first.channels * first.pixel_type.bytes_per_sample();
    let total_mb = grid
        .tiles
        .iter()
        .map(|t| t.nfrms * frame_bytes)
        .sum::<usize>() as f64
        / (1024.0 * 1024.0);
    println!("Data size:     {:.1} MB", total_mb);

    Ok(())
}

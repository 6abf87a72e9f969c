pub mod align;
pub mod fuse;
pub mod info;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mosaic_core::io::raw::RawVolumeReader;
use mosaic_core::tile::TileGrid;

/// Load a TOML tile index (`[[tiles]]` entries with filename, position and
/// size fields).
pub fn load_grid(index: &Path) -> Result<TileGrid> {
    let text = std::fs::read_to_string(index)
        .with_context(|| format!("reading tile index {}", index.display()))?;
    let grid: TileGrid = toml::from_str(&text)
        .with_context(|| format!("parsing tile index {}", index.display()))?;
    anyhow::ensure!(!grid.is_empty(), "tile index {} lists no tiles", index.display());
    Ok(grid)
}

/// Raw-volume reader resolving tile filenames relative to the index file.
pub fn reader_for(index: &Path) -> RawVolumeReader {
    let root: PathBuf = index
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    RawVolumeReader::new(root)
}

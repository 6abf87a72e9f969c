use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MosaicError, Result};

/// Axis along which two adjacent tiles overlap and must be aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StitchAxis {
    /// Tiles stacked along the frame row direction.
    Y,
    /// Tiles side by side along the frame column direction.
    X,
}

impl std::fmt::Display for StitchAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Y => write!(f, "y"),
            Self::X => write!(f, "x"),
        }
    }
}

/// Sample type of the stored tile data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    #[default]
    U8,
    U16,
}

impl PixelType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }
}

fn default_nfrms() -> usize {
    1
}

fn default_channels() -> usize {
    1
}

/// One acquired image volume at a known nominal grid position.
///
/// Positions are in pixel units relative to the top-left corner of the
/// full mosaic. Immutable once discovered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tile {
    /// Path or name identifying the tile; pipeline messages carry it by value.
    pub filename: String,
    pub x: usize,
    pub y: usize,
    #[serde(default)]
    pub z: usize,
    pub xsize: usize,
    pub ysize: usize,
    #[serde(default = "default_nfrms")]
    pub nfrms: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub pixel_type: PixelType,
}

/// A regular grid of tiles with nominal positions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TileGrid {
    pub tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Grid-adjacency groups along Y: one group per column (same nominal X),
    /// ordered by ascending Y within the group.
    pub fn tiles_along_y(&self) -> Vec<Vec<&Tile>> {
        self.grouped(|t| t.x, |t| t.y)
    }

    /// Grid-adjacency groups along X: one group per row (same nominal Y),
    /// ordered by ascending X within the group.
    pub fn tiles_along_x(&self) -> Vec<Vec<&Tile>> {
        self.grouped(|t| t.y, |t| t.x)
    }

    fn grouped(
        &self,
        key: impl Fn(&Tile) -> usize,
        order: impl Fn(&Tile) -> usize,
    ) -> Vec<Vec<&Tile>> {
        let mut groups: BTreeMap<usize, Vec<&Tile>> = BTreeMap::new();
        for tile in &self.tiles {
            groups.entry(key(tile)).or_default().push(tile);
        }
        let mut out: Vec<Vec<&Tile>> = groups.into_values().collect();
        for group in &mut out {
            group.sort_by_key(|t| order(t));
        }
        out
    }

    /// Shape (Z, Y, X) of the volume that encloses every positioned tile.
    pub fn output_shape(&self) -> (usize, usize, usize) {
        let nz = self.tiles.iter().map(|t| t.z + t.nfrms).max().unwrap_or(0);
        let ny = self.tiles.iter().map(|t| t.y + t.ysize).max().unwrap_or(0);
        let nx = self.tiles.iter().map(|t| t.x + t.xsize).max().unwrap_or(0);
        (nz, ny, nx)
    }

    /// Verify that every tile has the same frame shape. Blending weight
    /// masks are shared across tiles, so a silent mismatch would misalign
    /// blending; surface it as an error instead.
    pub fn validate_equal_shape(&self) -> Result<()> {
        let first = match self.tiles.first() {
            Some(t) => t,
            None => return Err(MosaicError::EmptyGrid),
        };
        for tile in &self.tiles[1..] {
            if tile.xsize != first.xsize || tile.ysize != first.ysize {
                return Err(MosaicError::ShapeMismatch {
                    a: first.filename.clone(),
                    a_width: first.xsize,
                    a_height: first.ysize,
                    b: tile.filename.clone(),
                    b_width: tile.xsize,
                    b_height: tile.ysize,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(name: &str, x: usize, y: usize) -> Tile {
        Tile {
            filename: name.into(),
            x,
            y,
            z: 0,
            xsize: 100,
            ysize: 100,
            nfrms: 1,
            channels: 1,
            pixel_type: PixelType::U8,
        }
    }

    #[test]
    fn adjacency_groups_are_sorted() {
        let grid = TileGrid::new(vec![
            tile("11", 80, 80),
            tile("00", 0, 0),
            tile("10", 0, 80),
            tile("01", 80, 0),
        ]);

        let cols = grid.tiles_along_y();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0][0].filename, "00");
        assert_eq!(cols[0][1].filename, "10");

        let rows = grid.tiles_along_x();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].filename, "10");
        assert_eq!(rows[1][1].filename, "11");
    }

    #[test]
    fn output_shape_encloses_all_tiles() {
        let grid = TileGrid::new(vec![tile("00", 0, 0), tile("11", 80, 80)]);
        assert_eq!(grid.output_shape(), (1, 180, 180));
    }

    #[test]
    fn equal_shape_violation_is_reported() {
        let mut odd = tile("odd", 0, 80);
        odd.xsize = 64;
        let grid = TileGrid::new(vec![tile("00", 0, 0), odd]);
        assert!(matches!(
            grid.validate_equal_shape(),
            Err(MosaicError::ShapeMismatch { .. })
        ));
    }
}

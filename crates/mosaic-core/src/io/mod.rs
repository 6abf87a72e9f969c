use ndarray::{Array2, Array3, Axis};

use crate::error::Result;
use crate::tile::Tile;

pub mod mem;
pub mod raw;

/// Reads sub-volumes of named tiles without loading the full tile.
///
/// Frames are returned as f32 in their stored value range; alignment and
/// fusion only care about relative intensities.
pub trait TileReader: Send + Sync {
    /// Read frames `z_from..z_to` of a tile as a dense (Z, Y, X) array,
    /// optionally selecting a single channel of multi-channel data.
    fn read_window(
        &self,
        tile: &Tile,
        z_from: usize,
        z_to: usize,
        channel: Option<usize>,
    ) -> Result<Array3<f32>>;

    /// Read a single frame as a (Y, X) array.
    fn read_frame(&self, tile: &Tile, z: usize, channel: Option<usize>) -> Result<Array2<f32>> {
        let window = self.read_window(tile, z, z + 1, channel)?;
        Ok(window.index_axis_move(Axis(0), 0))
    }
}

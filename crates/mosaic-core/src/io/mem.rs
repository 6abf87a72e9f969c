use std::collections::HashMap;

use ndarray::{s, Array3};

use crate::error::{MosaicError, Result};
use crate::io::TileReader;
use crate::tile::Tile;

/// In-memory tile store for tests and for callers that already hold decoded
/// volumes. Single-channel only.
#[derive(Default)]
pub struct MemoryReader {
    volumes: HashMap<String, Array3<f32>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a (Z, Y, X) volume under a tile name.
    pub fn insert(&mut self, name: impl Into<String>, volume: Array3<f32>) {
        self.volumes.insert(name.into(), volume);
    }
}

impl TileReader for MemoryReader {
    fn read_window(
        &self,
        tile: &Tile,
        z_from: usize,
        z_to: usize,
        channel: Option<usize>,
    ) -> Result<Array3<f32>> {
        if let Some(c) = channel {
            if c != 0 {
                return Err(MosaicError::ChannelOutOfRange {
                    channel: c,
                    channels: 1,
                });
            }
        }
        let volume = self
            .volumes
            .get(&tile.filename)
            .ok_or_else(|| MosaicError::InvalidVolume(format!("unknown tile {}", tile.filename)))?;
        if z_from >= z_to || z_to > volume.shape()[0] {
            return Err(MosaicError::FrameOutOfRange {
                tile: tile.filename.clone(),
                z_from,
                z_to,
                total: volume.shape()[0],
            });
        }
        Ok(volume.slice(s![z_from..z_to, .., ..]).to_owned())
    }
}

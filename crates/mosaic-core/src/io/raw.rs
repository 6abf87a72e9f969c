use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array3;

use crate::error::{MosaicError, Result};
use crate::io::TileReader;
use crate::tile::{PixelType, Tile};

/// Memory-mapped reader for headerless raw tile volumes.
///
/// A tile file stores `nfrms` frames of `ysize * xsize * channels`
/// little-endian samples, row-major with interleaved channels. All geometry
/// comes from the tile index, so partial-volume reads are plain offset
/// arithmetic into the map.
pub struct RawVolumeReader {
    root: PathBuf,
    maps: Mutex<HashMap<PathBuf, Arc<Mmap>>>,
}

impl RawVolumeReader {
    /// Create a reader resolving relative tile filenames against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            maps: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self, tile: &Tile) -> Result<Arc<Mmap>> {
        let path = {
            let p = Path::new(&tile.filename);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.root.join(p)
            }
        };

        if let Some(m) = self.maps.lock().unwrap().get(&path) {
            return Ok(Arc::clone(m));
        }

        let file = File::open(&path)?;
        let mmap = Arc::new(unsafe { Mmap::map(&file)? });

        let expected = tile.nfrms
            * tile.ysize
            * tile.xsize
            * tile.channels
            * tile.pixel_type.bytes_per_sample();
        if mmap.len() < expected {
            return Err(MosaicError::InvalidVolume(format!(
                "{}: expected at least {} bytes, got {}",
                tile.filename,
                expected,
                mmap.len()
            )));
        }

        let mut maps = self.maps.lock().unwrap();
        Ok(Arc::clone(maps.entry(path).or_insert(mmap)))
    }
}

fn resolve_channel(tile: &Tile, channel: Option<usize>) -> Result<usize> {
    match channel {
        Some(c) if c < tile.channels => Ok(c),
        Some(c) => Err(MosaicError::ChannelOutOfRange {
            channel: c,
            channels: tile.channels,
        }),
        None if tile.channels == 1 => Ok(0),
        None => Err(MosaicError::Config(format!(
            "{}: channel selector required for {}-channel tiles",
            tile.filename, tile.channels
        ))),
    }
}

impl TileReader for RawVolumeReader {
    fn read_window(
        &self,
        tile: &Tile,
        z_from: usize,
        z_to: usize,
        channel: Option<usize>,
    ) -> Result<Array3<f32>> {
        if z_from >= z_to || z_to > tile.nfrms {
            return Err(MosaicError::FrameOutOfRange {
                tile: tile.filename.clone(),
                z_from,
                z_to,
                total: tile.nfrms,
            });
        }
        let chan = resolve_channel(tile, channel)?;
        let mmap = self.map(tile)?;

        let (h, w, ch) = (tile.ysize, tile.xsize, tile.channels);
        let frame_samples = h * w * ch;
        let mut out = Array3::<f32>::zeros((z_to - z_from, h, w));

        match tile.pixel_type {
            PixelType::U8 => {
                for (zi, z) in (z_from..z_to).enumerate() {
                    let frame = &mmap[z * frame_samples..(z + 1) * frame_samples];
                    for y in 0..h {
                        let row = &frame[y * w * ch..(y + 1) * w * ch];
                        for x in 0..w {
                            out[[zi, y, x]] = row[x * ch + chan] as f32;
                        }
                    }
                }
            }
            PixelType::U16 => {
                for (zi, z) in (z_from..z_to).enumerate() {
                    let frame = &mmap[z * frame_samples * 2..(z + 1) * frame_samples * 2];
                    for y in 0..h {
                        let row = &frame[y * w * ch * 2..(y + 1) * w * ch * 2];
                        for x in 0..w {
                            let i = (x * ch + chan) * 2;
                            out[[zi, y, x]] = LittleEndian::read_u16(&row[i..i + 2]) as f32;
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Write a fused volume as raw little-endian f32, frame by frame.
pub fn write_volume(path: &Path, volume: &Array3<f32>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &v in volume.iter() {
        writer.write_f32::<LittleEndian>(v)?;
    }
    writer.flush()?;
    Ok(())
}

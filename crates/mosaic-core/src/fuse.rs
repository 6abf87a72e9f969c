use std::sync::mpsc::Receiver;

use ndarray::{s, Array3, Axis, Zip};
use tracing::debug;

use crate::consts::BORDER_MARKER_PX;
use crate::error::{MosaicError, Result};
use crate::mask::MaskCache;
use crate::tile::{Tile, TileGrid};

/// Region where a neighboring tile overlaps a layer. Z is in output-volume
/// coordinates, Y/X are layer-local pixel ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlapRegion {
    pub z_from: usize,
    pub z_to: usize,
    pub y_from: usize,
    pub y_to: usize,
    pub x_from: usize,
    pub x_to: usize,
}

/// One tile's contribution to the output volume: the decoded layer, its
/// absolute placement, and every overlap touching it. Consumed exactly once
/// by [`fuse_stream`].
pub struct FusionItem {
    pub layer: Array3<f32>,
    /// (Z, Y, X) of the layer's first voxel in the output volume.
    pub top_left: [usize; 3],
    pub overlaps: Vec<OverlapRegion>,
}

/// Fusion options. `debug_borders` saturates a 2-pixel band along two edges
/// of every layer so tile boundaries stay visible in the fused volume; a
/// debugging aid only.
#[derive(Clone, Copy, Debug, Default)]
pub struct FuseOptions {
    pub debug_borders: bool,
}

/// Derive the overlap descriptors for `tile` from final tile positions by
/// box intersection. Degenerate (zero-area) intersections are dropped.
pub fn overlap_regions(grid: &TileGrid, tile: &Tile) -> Vec<OverlapRegion> {
    let mut regions = Vec::new();
    for other in &grid.tiles {
        if std::ptr::eq(other, tile) || other.filename == tile.filename {
            continue;
        }
        let z_from = tile.z.max(other.z);
        let z_to = (tile.z + tile.nfrms).min(other.z + other.nfrms);
        let y_lo = tile.y.max(other.y);
        let y_hi = (tile.y + tile.ysize).min(other.y + other.ysize);
        let x_lo = tile.x.max(other.x);
        let x_hi = (tile.x + tile.xsize).min(other.x + other.xsize);
        if z_from >= z_to || y_lo >= y_hi || x_lo >= x_hi {
            continue;
        }
        regions.push(OverlapRegion {
            z_from,
            z_to,
            y_from: y_lo - tile.y,
            y_to: y_hi - tile.y,
            x_from: x_lo - tile.x,
            x_to: x_hi - tile.x,
        });
    }
    regions
}

/// Fuse a stream of positioned layers into one output volume.
///
/// Each item is self-normalizing: its overlap descriptors alone determine
/// the per-Z-band weight sums, so items may arrive in any order and simply
/// accumulate. The stream ends when the sending side disconnects.
///
/// For every Z band cut at overlap boundaries, the weight sum starts from
/// the layer's own alpha mask; each neighbor covering the band adds its
/// mask contribution into the shared sub-window, flipped to match the
/// border it overlaps from. The layer is rescaled by `own / sum`, so
/// overlapping pixels blend proportionally and pixels with no other
/// contributor pass through unchanged.
pub fn fuse_stream(
    items: Receiver<FusionItem>,
    output_shape: (usize, usize, usize),
    masks: &MaskCache,
    options: &FuseOptions,
) -> Result<Array3<f32>> {
    let (nz, ny, nx) = output_shape;
    let mut stripe = Array3::<f32>::zeros(output_shape);

    for mut item in items {
        let (depth, h, w) = item.layer.dim();
        let [z0, y0, x0] = item.top_left;
        if z0 + depth > nz || y0 + h > ny || x0 + w > nx {
            return Err(MosaicError::Pipeline(format!(
                "layer at ({z0}, {y0}, {x0}) of shape {depth}x{h}x{w} exceeds output {nz}x{ny}x{nx}"
            )));
        }

        let own = masks.get(h, w);
        blend_layer(&mut item, &own, z0, depth, h, w)?;

        if options.debug_borders {
            mark_borders(&mut item.layer);
        }

        let mut roi = stripe.slice_mut(s![z0..z0 + depth, y0..y0 + h, x0..x0 + w]);
        roi += &item.layer;
        debug!(z = z0, y = y0, x = x0, "layer accumulated");
    }

    Ok(stripe)
}

fn blend_layer(
    item: &mut FusionItem,
    own: &ndarray::Array2<f32>,
    z0: usize,
    depth: usize,
    h: usize,
    w: usize,
) -> Result<()> {
    // Z band boundaries come from the overlap descriptors alone; a layer
    // with no overlaps is accumulated as-is.
    let mut cuts: Vec<usize> = item
        .overlaps
        .iter()
        .flat_map(|ov| [ov.z_from, ov.z_to])
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    for pair in cuts.windows(2) {
        let (band_from, band_to) = (pair[0], pair[1]);
        let lo = band_from.max(z0);
        let hi = band_to.min(z0 + depth);
        if lo >= hi {
            continue;
        }

        let mut sums = own.clone();
        for ov in &item.overlaps {
            if !(ov.z_from <= band_from && band_to <= ov.z_to) {
                continue;
            }
            let oh = ov.y_to.saturating_sub(ov.y_from);
            let ow = ov.x_to.saturating_sub(ov.x_from);
            if oh == 0 || ow == 0 {
                continue;
            }
            if ov.y_to > h || ov.x_to > w {
                return Err(MosaicError::Pipeline(format!(
                    "overlap region {}..{}x{}..{} outside layer {}x{}",
                    ov.y_from, ov.y_to, ov.x_from, ov.x_to, h, w
                )));
            }

            // Neighbor contribution: the tile's own mask cropped to the
            // overlap size (tiles share a shape), flipped to face the
            // border the neighbor overlaps from.
            let mut weight = own.slice(s![..oh, ..ow]).to_owned();
            if ov.x_from == 0 {
                weight.invert_axis(Axis(1));
            }
            if ov.y_from == 0 {
                weight.invert_axis(Axis(0));
            }
            let mut sub = sums.slice_mut(s![ov.y_from..ov.y_to, ov.x_from..ov.x_to]);
            sub += &weight;
        }

        let mut band = item.layer.slice_mut(s![lo - z0..hi - z0, .., ..]);
        for mut plane in band.axis_iter_mut(Axis(0)) {
            Zip::from(&mut plane).and(own).and(&sums).for_each(|p, &o, &s| {
                // Zero weight sum implies zero own weight: no contributor
                // claims the pixel, so it passes through with factor 1.
                if s > 0.0 {
                    *p *= o / s;
                }
            });
        }
    }

    Ok(())
}

/// Saturate a 2-pixel band along the bottom and right edges of every frame.
fn mark_borders(layer: &mut Array3<f32>) {
    let (_, h, w) = layer.dim();
    if h <= BORDER_MARKER_PX || w <= BORDER_MARKER_PX {
        return;
    }
    let marker = layer.fold(0.0f32, |acc, &v| acc.max(v));
    layer
        .slice_mut(s![.., h - BORDER_MARKER_PX.., ..])
        .fill(marker);
    layer
        .slice_mut(s![.., .., w - BORDER_MARKER_PX..])
        .fill(marker);
}

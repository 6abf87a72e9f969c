use std::sync::mpsc;
use std::thread;

use ndarray::Array3;
use tracing::info;

use crate::align::{aggregate, run_alignment, PairShift};
use crate::consts::FUSION_QUEUE_DEPTH;
use crate::error::{MosaicError, Result};
use crate::fuse::{fuse_stream, overlap_regions, FuseOptions, FusionItem};
use crate::io::TileReader;
use crate::mask::MaskCache;
use crate::tile::TileGrid;

use super::config::{AlignConfig, FuseConfig};
use super::progress::{ProgressReporter, StitchStage};

/// Run pairwise alignment over the grid and aggregate the measurements into
/// one shift record per tile pair.
pub fn stitch_alignment<R: TileReader>(
    reader: &R,
    grid: &TileGrid,
    config: &AlignConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PairShift>> {
    let measurements = run_alignment(reader, grid, config, reporter)?;

    reporter.begin_stage(StitchStage::Aggregation, Some(measurements.len()));
    let results = aggregate(&measurements, config.mode, config.overlap_v);
    reporter.finish_stage();

    info!(
        measurements = measurements.len(),
        pairs = results.len(),
        "alignment aggregated"
    );
    Ok(results)
}

/// Fuse every positioned tile of the grid into one output volume.
///
/// One producer thread streams decoded layers through a small bounded queue
/// into the strictly sequential accumulator; accumulation into the shared
/// output buffer is single-threaded so overlapping regions never race. A
/// tile that cannot be read aborts the run: fusion with holes is not a
/// usable volume.
pub fn run_fusion<R: TileReader>(
    reader: &R,
    grid: &TileGrid,
    config: &FuseConfig,
    masks: &MaskCache,
    reporter: &dyn ProgressReporter,
) -> Result<Array3<f32>> {
    if grid.is_empty() {
        return Err(MosaicError::EmptyGrid);
    }
    // Neighbor weight contributions crop the shared mask, which is only
    // meaningful when every tile has the same frame shape.
    grid.validate_equal_shape()?;

    let output_shape = grid.output_shape();
    info!(
        tiles = grid.tiles.len(),
        shape = ?output_shape,
        "starting fusion"
    );
    reporter.begin_stage(StitchStage::Fusion, Some(grid.tiles.len()));

    let options = FuseOptions {
        debug_borders: config.debug_borders,
    };
    let (tx, rx) = mpsc::sync_channel::<FusionItem>(FUSION_QUEUE_DEPTH);

    let stripe = thread::scope(|scope| -> Result<Array3<f32>> {
        let producer = scope.spawn(move || -> Result<()> {
            for (i, tile) in grid.tiles.iter().enumerate() {
                let layer = reader.read_window(tile, 0, tile.nfrms, config.channel)?;
                let item = FusionItem {
                    layer,
                    top_left: [tile.z, tile.y, tile.x],
                    overlaps: overlap_regions(grid, tile),
                };
                if tx.send(item).is_err() {
                    break;
                }
                reporter.advance(i + 1);
            }
            Ok(())
        });

        let stripe = fuse_stream(rx, output_shape, masks, &options)?;
        match producer.join() {
            Ok(Ok(())) => Ok(stripe),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(MosaicError::Pipeline("fusion producer panicked".into())),
        }
    })?;

    reporter.finish_stage();
    Ok(stripe)
}

use std::sync::mpsc;

use ndarray::Array3;

use mosaic_core::fuse::{fuse_stream, overlap_regions, FuseOptions, FusionItem, OverlapRegion};
use mosaic_core::io::mem::MemoryReader;
use mosaic_core::mask::MaskCache;
use mosaic_core::pipeline::{run_fusion, FuseConfig, NoOpReporter};
use mosaic_core::tile::{PixelType, Tile, TileGrid};

fn tile(name: &str, x: usize, y: usize, xsize: usize, ysize: usize) -> Tile {
    Tile {
        filename: name.into(),
        x,
        y,
        z: 0,
        xsize,
        ysize,
        nfrms: 1,
        channels: 1,
        pixel_type: PixelType::U8,
    }
}

#[test]
fn test_overlap_regions_by_box_intersection() {
    let grid = TileGrid::new(vec![
        tile("a", 0, 0, 100, 40),
        tile("b", 80, 0, 100, 40),
        tile("far", 500, 500, 100, 40),
    ]);

    let regions = overlap_regions(&grid, &grid.tiles[0]);
    assert_eq!(regions.len(), 1);
    let ov = regions[0];
    assert_eq!((ov.x_from, ov.x_to), (80, 100));
    assert_eq!((ov.y_from, ov.y_to), (0, 40));
    assert_eq!((ov.z_from, ov.z_to), (0, 1));

    // From b's perspective the same overlap starts at its left border.
    let regions = overlap_regions(&grid, &grid.tiles[1]);
    assert_eq!(regions.len(), 1);
    assert_eq!((regions[0].x_from, regions[0].x_to), (0, 20));
}

#[test]
fn test_touching_tiles_do_not_overlap() {
    let grid = TileGrid::new(vec![tile("a", 0, 0, 100, 40), tile("b", 100, 0, 100, 40)]);
    assert!(overlap_regions(&grid, &grid.tiles[0]).is_empty());
}

#[test]
fn test_single_layer_passes_through_unchanged() {
    let masks = MaskCache::new();
    let (tx, rx) = mpsc::sync_channel(1);
    tx.send(FusionItem {
        layer: Array3::from_elem((2, 8, 8), 5.0),
        top_left: [1, 4, 4],
        overlaps: Vec::new(),
    })
    .unwrap();
    drop(tx);

    let out = fuse_stream(rx, (4, 16, 16), &masks, &FuseOptions::default()).unwrap();
    assert_eq!(out[[1, 4, 4]], 5.0);
    assert_eq!(out[[2, 11, 11]], 5.0);
    // Outside the placement nothing was written.
    assert_eq!(out[[0, 4, 4]], 0.0);
    assert_eq!(out[[1, 3, 4]], 0.0);
}

#[test]
fn test_layer_outside_output_is_rejected() {
    let masks = MaskCache::new();
    let (tx, rx) = mpsc::sync_channel(1);
    tx.send(FusionItem {
        layer: Array3::from_elem((1, 8, 8), 1.0),
        top_left: [0, 10, 0],
        overlaps: Vec::new(),
    })
    .unwrap();
    drop(tx);

    assert!(fuse_stream(rx, (1, 16, 16), &masks, &FuseOptions::default()).is_err());
}

#[test]
fn test_blend_weights_of_a_pair_sum_to_one() {
    // Two constant tiles overlapping by 20 px: wherever both masks carry
    // weight the blend factors must sum to one, so the fused value equals
    // the shared constant.
    let mut reader = MemoryReader::new();
    reader.insert("a", Array3::from_elem((1, 40, 100), 7.0));
    reader.insert("b", Array3::from_elem((1, 40, 100), 7.0));
    let grid = TileGrid::new(vec![tile("a", 0, 0, 100, 40), tile("b", 80, 0, 100, 40)]);

    let masks = MaskCache::new();
    let out = run_fusion(
        &reader,
        &grid,
        &FuseConfig::default(),
        &masks,
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(out.dim(), (1, 40, 180));

    // Exclusive regions pass through exactly.
    assert_eq!(out[[0, 20, 10]], 7.0);
    assert_eq!(out[[0, 20, 150]], 7.0);

    // Interior of the overlap band.
    for y in 8..32 {
        for x in 85..95 {
            let v = out[[0, y, x]];
            assert!((v - 7.0).abs() < 1e-3, "({y}, {x}) = {v}");
        }
    }
}

#[test]
fn test_coincident_layers_contribute_half_each() {
    // Two layers at the same position carry equal weight everywhere, so
    // interior pixels blend to the plain mean of the two values.
    let masks = MaskCache::new();
    let (tx, rx) = mpsc::sync_channel(2);
    for value in [4.0f32, 8.0] {
        tx.send(FusionItem {
            layer: Array3::from_elem((1, 20, 30), value),
            top_left: [0, 0, 0],
            overlaps: vec![OverlapRegion {
                z_from: 0,
                z_to: 1,
                y_from: 0,
                y_to: 20,
                x_from: 0,
                x_to: 30,
            }],
        })
        .unwrap();
    }
    drop(tx);

    let out = fuse_stream(rx, (1, 20, 30), &masks, &FuseOptions::default()).unwrap();
    for y in 5..15 {
        for x in 5..25 {
            let v = out[[0, y, x]];
            assert!((v - 6.0).abs() < 1e-4, "({y}, {x}) = {v}");
        }
    }
}

#[test]
fn test_debug_borders_saturate_layer_edges() {
    let mut reader = MemoryReader::new();
    let ramp = Array3::from_shape_fn((1, 16, 16), |(_, _, x)| x as f32);
    reader.insert("a", ramp);
    let grid = TileGrid::new(vec![tile("a", 0, 0, 16, 16)]);

    let config = FuseConfig {
        channel: None,
        debug_borders: true,
    };
    let masks = MaskCache::new();
    let out = run_fusion(&reader, &grid, &config, &masks, &NoOpReporter).unwrap();

    // The bottom and right 2 px bands carry the layer maximum, the rest is
    // intact.
    assert_eq!(out[[0, 15, 0]], 15.0);
    assert_eq!(out[[0, 0, 14]], 15.0);
    assert_eq!(out[[0, 5, 5]], 5.0);
    assert_eq!(out[[0, 0, 13]], 13.0);
}

#[test]
fn test_empty_grid_fusion_is_rejected() {
    let reader = MemoryReader::new();
    let grid = TileGrid::default();
    let masks = MaskCache::new();
    assert!(run_fusion(&reader, &grid, &FuseConfig::default(), &masks, &NoOpReporter).is_err());
}

use approx::assert_relative_eq;
use ndarray::Array3;

use mosaic_core::io::mem::MemoryReader;
use mosaic_core::mask::MaskCache;
use mosaic_core::pipeline::{run_fusion, FuseConfig, NoOpReporter};
use mosaic_core::tile::{PixelType, Tile, TileGrid};

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

/// Fuse a 2x2 grid of constant tiles with 20 px overlaps and check that
/// every region of the mosaic blends the right contributors.
#[test]
fn test_two_by_two_grid_fusion() {
    let constants = [("t00", 0, 0, 10.0f32), ("t01", 80, 0, 20.0), ("t10", 0, 80, 30.0), ("t11", 80, 80, 40.0)];

    let mut reader = MemoryReader::new();
    let mut tiles = Vec::new();
    for &(name, x, y, value) in &constants {
        reader.insert(name, Array3::from_elem((1, 100, 100), value));
        tiles.push(tile(name, x, y));
    }
    let grid = TileGrid::new(tiles);

    let masks = MaskCache::new();
    let out = run_fusion(
        &reader,
        &grid,
        &FuseConfig::default(),
        &masks,
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(out.dim(), (1, 180, 180));

    // Exclusive quadrants pass through exactly.
    assert_relative_eq!(out[[0, 40, 40]], 10.0);
    assert_relative_eq!(out[[0, 40, 140]], 20.0);
    assert_relative_eq!(out[[0, 140, 40]], 30.0);
    assert_relative_eq!(out[[0, 140, 140]], 40.0);

    // Two-tile bands blend only their pair, so the value stays between the
    // two constants.
    for x in 82..98 {
        let v = out[[0, 40, x]];
        assert!((10.0..=20.0).contains(&v), "top band ({x}) = {v}");
    }
    for y in 82..98 {
        let v = out[[0, y, 40]];
        assert!((10.0..=30.0).contains(&v), "left band ({y}) = {v}");
    }

    // The central cross is claimed by all four tiles.
    for y in 85..95 {
        for x in 85..95 {
            let v = out[[0, y, x]];
            assert!((10.0..=40.0).contains(&v), "center ({y}, {x}) = {v}");
        }
    }

    // Walking into the overlap the blend hands over smoothly: next to the
    // exclusive region the value is still dominated by the nearer tile.
    assert!(out[[0, 40, 81]] < 15.0, "near edge = {}", out[[0, 40, 81]]);
    assert!(out[[0, 40, 98]] > 15.0, "far edge = {}", out[[0, 40, 98]]);
}

/// Tiles stacked at different Z heights land at their Z offset in the
/// output volume.
#[test]
fn test_z_offset_placement() {
    let mut reader = MemoryReader::new();
    reader.insert("lo", Array3::from_elem((2, 100, 100), 1.0));
    reader.insert("hi", Array3::from_elem((2, 100, 100), 2.0));

    let mut hi = tile("hi", 0, 0);
    hi.z = 3;
    hi.nfrms = 2;
    let mut lo = tile("lo", 200, 0);
    lo.nfrms = 2;
    let grid = TileGrid::new(vec![lo, hi]);

    let masks = MaskCache::new();
    let out = run_fusion(
        &reader,
        &grid,
        &FuseConfig::default(),
        &masks,
        &NoOpReporter,
    )
    .unwrap();
    assert_eq!(out.dim(), (5, 100, 300));

    assert_eq!(out[[0, 50, 250]], 1.0);
    assert_eq!(out[[2, 50, 50]], 0.0);
    assert_eq!(out[[3, 50, 50]], 2.0);
    assert_eq!(out[[4, 50, 50]], 2.0);
}

use std::sync::Arc;

use mosaic_core::mask::{squircle_alpha, MaskCache};

#[test]
fn test_center_weight_is_one() {
    let mask = squircle_alpha(40, 60);
    assert_eq!(mask.dim(), (40, 60));
    assert_eq!(mask[[20, 30]], 1.0);
}

#[test]
fn test_corner_weight_is_zero() {
    let mask = squircle_alpha(40, 60);
    assert!(mask[[39, 59]].abs() < 1e-6, "corner={}", mask[[39, 59]]);
    assert!(mask[[0, 0]].abs() < 1e-6, "corner={}", mask[[0, 0]]);
}

#[test]
fn test_four_fold_symmetry() {
    let mask = squircle_alpha(40, 60);
    for y in 0..40 {
        for x in 0..60 {
            let v = mask[[y, x]];
            assert_eq!(v, mask[[39 - y, x]], "vertical mirror at ({y}, {x})");
            assert_eq!(v, mask[[y, 59 - x]], "horizontal mirror at ({y}, {x})");
        }
    }
}

#[test]
fn test_weight_falls_towards_border() {
    let mask = squircle_alpha(40, 60);

    // Along the central row and column the weight never increases when
    // walking from the center outwards.
    let mut prev = mask[[20, 30]];
    for x in 30..60 {
        let v = mask[[20, x]];
        assert!(v <= prev + 1e-6, "row weight rose at x={x}: {v} > {prev}");
        prev = v;
    }
    let mut prev = mask[[20, 30]];
    for y in 20..40 {
        let v = mask[[y, 30]];
        assert!(v <= prev + 1e-6, "col weight rose at y={y}: {v} > {prev}");
        prev = v;
    }
}

#[test]
fn test_odd_dimensions_are_covered() {
    let mask = squircle_alpha(41, 61);
    assert_eq!(mask.dim(), (41, 61));
    assert_eq!(mask[[20, 30]], 1.0);
    // No pixel left unwritten: the interior of the mask is strictly positive.
    assert!(mask[[20, 29]] > 0.0);
    assert!(mask[[19, 30]] > 0.0);
}

#[test]
fn test_degenerate_shapes() {
    assert_eq!(squircle_alpha(0, 5).dim(), (0, 5));
    assert_eq!(squircle_alpha(5, 0).dim(), (5, 0));

    let single = squircle_alpha(1, 1);
    assert_eq!(single[[0, 0]], 1.0);
}

#[test]
fn test_cache_shares_masks_by_shape() {
    let cache = MaskCache::new();
    let a = cache.get(32, 48);
    let b = cache.get(32, 48);
    assert!(Arc::ptr_eq(&a, &b), "same shape must share one mask");

    let c = cache.get(48, 32);
    assert!(!Arc::ptr_eq(&a, &c), "different shapes must not share");
    assert_eq!(c.dim(), (48, 32));
}

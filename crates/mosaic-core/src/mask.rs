use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::Array2;

use crate::consts::{SQUIRCLE_MAX_EXPONENT, SQUIRCLE_MIN_EXPONENT};

/// Compute the squircle blending-weight mask for a frame shape.
///
/// The mask is built from concentric superellipse rings whose exponent grows
/// geometrically from 2 (ellipse) to 50 (near-rectangle) towards the border.
/// Each pixel takes the squared linear weight of the smallest ring that
/// strictly contains it. After mirroring the computed quadrant into all four
/// quadrants the mask is normalized and inverted, so the weight is 1 at the
/// center and falls to ~0 at the border, biasing blending towards each
/// tile's least distorted central region.
///
/// Deterministic, pure function of shape. Use [`MaskCache`] to share masks
/// between tiles of equal size.
pub fn squircle_alpha(height: usize, width: usize) -> Array2<f32> {
    if height == 0 || width == 0 {
        return Array2::zeros((height, width));
    }

    let b = height / 2;
    let a = width / 2;
    if a == 0 && b == 0 {
        return Array2::from_elem((height, width), 1.0);
    }

    let n = a.max(b);
    let ratio = width as f64 / height as f64;

    // Ring exponents are log-spaced, ring weights linear in [0, 1].
    let log_lo = SQUIRCLE_MIN_EXPONENT.log10();
    let log_hi = SQUIRCLE_MAX_EXPONENT.log10();
    let ps: Vec<f64> = (0..n)
        .map(|i| {
            if n == 1 {
                SQUIRCLE_MIN_EXPONENT
            } else {
                10f64.powf(log_lo + i as f64 * (log_hi - log_lo) / (n - 1) as f64)
            }
        })
        .collect();
    let alphas: Vec<f64> = (0..n)
        .map(|i| if n == 1 { 1.0 } else { i as f64 / (n - 1) as f64 })
        .collect();

    // The larger half-dimension drives the ring step; the other semi-axis
    // follows through the aspect ratio. This also keeps degenerate
    // single-pixel dimensions free of zero divides.
    let (dra, drb, ras, rbs) = if a > b {
        let dra = a as f64 / n as f64;
        let ras: Vec<f64> = (0..n).map(|i| i as f64 * dra + 1.0).collect();
        let rbs: Vec<f64> = ras.iter().map(|r| r / ratio).collect();
        (dra, dra / ratio, ras, rbs)
    } else {
        let drb = b as f64 / n as f64;
        let rbs: Vec<f64> = (0..n).map(|i| i as f64 * drb + 1.0).collect();
        let ras: Vec<f64> = rbs.iter().map(|r| r * ratio).collect();
        (drb * ratio, drb, ras, rbs)
    };

    let mut mask = Array2::<f32>::zeros((height, width));

    // One quadrant by symmetry; includes the middle row/column for odd sizes.
    for y in 0..height - b {
        for x in 0..width - a {
            let j = x as f64 / dra;
            let k = y as f64 / drb;
            let start = (j.max(k) as usize).min(n - 1);

            // Smallest ring whose superellipse strictly contains the pixel;
            // pixels outside every ring take the outermost weight.
            let mut chosen = n - 1;
            for ii in start..n {
                let c = (x as f64 / ras[ii]).powf(ps[ii]) + (y as f64 / rbs[ii]).powf(ps[ii]);
                if c < 1.0 {
                    chosen = ii;
                    break;
                }
            }

            mask[[b + y, a + x]] = (alphas[chosen] * alphas[chosen]) as f32;
        }
    }

    // Mirror the quadrant: top from bottom, then left from right.
    for y in 0..b {
        for x in a..width {
            mask[[y, x]] = mask[[height - 1 - y, x]];
        }
    }
    for y in 0..height {
        for x in 0..a {
            mask[[y, x]] = mask[[y, width - 1 - x]];
        }
    }

    let max = mask.fold(0.0f32, |acc, &v| acc.max(v));
    if max > 0.0 {
        mask.mapv_inplace(|v| 1.0 - v / max);
    } else {
        mask.fill(1.0);
    }

    mask
}

/// Shared cache of blending masks keyed by frame shape.
///
/// Tiles of equal size reuse one mask. Racing computations may produce a
/// duplicate that is discarded on insert; the cached value is deterministic
/// either way and is never mutated after creation.
#[derive(Default)]
pub struct MaskCache {
    inner: Mutex<HashMap<(usize, usize), Arc<Array2<f32>>>>,
}

impl MaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the mask for `(height, width)`, computing it on first use.
    pub fn get(&self, height: usize, width: usize) -> Arc<Array2<f32>> {
        if let Some(mask) = self.inner.lock().unwrap().get(&(height, width)) {
            return Arc::clone(mask);
        }

        // Computed outside the lock; a concurrent duplicate is harmless.
        let mask = Arc::new(squircle_alpha(height, width));
        let mut cache = self.inner.lock().unwrap();
        Arc::clone(cache.entry((height, width)).or_insert(mask))
    }
}

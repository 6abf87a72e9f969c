use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use num_complex::Complex;
use rustfft::FftPlanner;

use crate::consts::XCORR_EPSILON;
use crate::error::{MosaicError, Result};

/// Location and value of the global maximum of a correlation volume.
#[derive(Clone, Copy, Debug)]
pub struct CorrelationPeak {
    pub z: usize,
    pub y: usize,
    pub x: usize,
    pub score: f32,
}

/// Normalized cross-correlation of `template` against `image`, valid mode.
///
/// The raw correlation is computed in the Fourier domain on zero-padded
/// transforms (linear, not circular), then normalized per window position by
/// the local image statistics from running sums, so every output value is a
/// true correlation coefficient in [-1, 1]. Output shape is
/// `(hi - ht + 1, wi - wt + 1)`.
pub fn normxcorr_valid(image: ArrayView2<f32>, template: ArrayView2<f32>) -> Result<Array2<f32>> {
    let (hi, wi) = image.dim();
    let (ht, wt) = template.dim();
    if ht == 0 || wt == 0 {
        return Err(MosaicError::Pipeline("empty correlation template".into()));
    }
    if ht > hi || wt > wi {
        return Err(MosaicError::Pipeline(format!(
            "correlation template {}x{} larger than image {}x{}",
            wt, ht, wi, hi
        )));
    }

    // Padding to the full linear-correlation extent keeps the valid region
    // free of wrap-around.
    let ph = hi + ht - 1;
    let pw = wi + wt - 1;
    let image_fft = fft2d_padded(image, ph, pw);
    let template_fft = fft2d_padded(template, ph, pw);

    let mut cross = Array2::<Complex<f64>>::zeros((ph, pw));
    for row in 0..ph {
        for col in 0..pw {
            cross[[row, col]] = image_fft[[row, col]] * template_fft[[row, col]].conj();
        }
    }
    let cc = ifft2d(&cross);

    let sums = integral_image(image, |v| v);
    let squares = integral_image(image, |v| v * v);

    let n = (ht * wt) as f64;
    let mut template_sum = 0.0f64;
    let mut template_sq = 0.0f64;
    for &v in template.iter() {
        template_sum += v as f64;
        template_sq += (v as f64) * (v as f64);
    }
    let template_var = (template_sq - template_sum * template_sum / n).max(0.0);

    let oh = hi - ht + 1;
    let ow = wi - wt + 1;
    let mut out = Array2::<f32>::zeros((oh, ow));
    if template_var <= XCORR_EPSILON {
        // Flat template correlates equally with everything.
        return Ok(out);
    }

    for u in 0..oh {
        for v in 0..ow {
            let local_sum = window_sum(&sums, u, v, ht, wt);
            let local_var = (window_sum(&squares, u, v, ht, wt) - local_sum * local_sum / n).max(0.0);
            let numerator = cc[[u, v]] - local_sum * template_sum / n;
            let denominator = (local_var * template_var).sqrt();
            if denominator > XCORR_EPSILON {
                out[[u, v]] = (numerator / denominator).clamp(-1.0, 1.0) as f32;
            }
        }
    }

    Ok(out)
}

/// Correlate a single-frame template against every Z slice of a stack and
/// return the global peak across the resulting correlation volume.
pub fn correlate_stack(
    stack: ArrayView3<f32>,
    template: ArrayView2<f32>,
) -> Result<CorrelationPeak> {
    if stack.shape()[0] == 0 {
        return Err(MosaicError::Pipeline("empty correlation stack".into()));
    }

    let surfaces = stack
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|slice| normxcorr_valid(slice, template))
        .collect::<Result<Vec<_>>>()?;

    let mut peak = CorrelationPeak {
        z: 0,
        y: 0,
        x: 0,
        score: f32::NEG_INFINITY,
    };
    for (z, surface) in surfaces.iter().enumerate() {
        for ((y, x), &score) in surface.indexed_iter() {
            if score > peak.score {
                peak = CorrelationPeak { z, y, x, score };
            }
        }
    }

    Ok(peak)
}

/// 2D FFT of real data zero-padded to (ph, pw): row-wise FFT, then
/// column-wise FFT.
fn fft2d_padded(data: ArrayView2<f32>, ph: usize, pw: usize) -> Array2<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(pw);
    let fft_col = planner.plan_fft_forward(ph);

    let mut result = Array2::<Complex<f64>>::zeros((ph, pw));
    for ((row, col), &v) in data.indexed_iter() {
        result[[row, col]] = Complex::new(v as f64, 0.0);
    }

    for row in 0..ph {
        let mut row_data: Vec<Complex<f64>> = (0..pw).map(|c| result[[row, c]]).collect();
        fft_row.process(&mut row_data);
        for col in 0..pw {
            result[[row, col]] = row_data[col];
        }
    }

    for col in 0..pw {
        let mut col_data: Vec<Complex<f64>> = (0..ph).map(|r| result[[r, col]]).collect();
        fft_col.process(&mut col_data);
        for row in 0..ph {
            result[[row, col]] = col_data[row];
        }
    }

    result
}

/// Inverse 2D FFT, returning the normalized real part.
fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();

    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| work[[r, col]]).collect();
        ifft_col.process(&mut col_data);
        for row in 0..h {
            work[[row, col]] = col_data[row];
        }
    }

    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| work[[row, c]]).collect();
        ifft_row.process(&mut row_data);
        for col in 0..w {
            work[[row, col]] = row_data[col];
        }
    }

    let scale = 1.0 / (h * w) as f64;
    let mut result = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            result[[row, col]] = work[[row, col]].re * scale;
        }
    }

    result
}

/// Summed-area table with a zero top row and left column, so any window sum
/// is four lookups.
fn integral_image(data: ArrayView2<f32>, f: impl Fn(f64) -> f64) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut sat = Array2::<f64>::zeros((h + 1, w + 1));
    for row in 0..h {
        let mut running = 0.0f64;
        for col in 0..w {
            running += f(data[[row, col]] as f64);
            sat[[row + 1, col + 1]] = sat[[row, col + 1]] + running;
        }
    }
    sat
}

fn window_sum(sat: &Array2<f64>, u: usize, v: usize, ht: usize, wt: usize) -> f64 {
    sat[[u + ht, v + wt]] - sat[[u, v + wt]] - sat[[u + ht, v]] + sat[[u, v]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn pattern(h: usize, w: usize) -> Array2<f32> {
        let mut data = Array2::<f32>::zeros((h, w));
        for ((y, x), v) in data.indexed_iter_mut() {
            // Hashed field: no shift of the window reproduces it, so the
            // correlation peak is unique. Plain modular mixes are periodic
            // and can score 1.0 at a second offset.
            let hash = ((x as i64).wrapping_mul(73_856_093) ^ (y as i64).wrapping_mul(19_349_663))
                .wrapping_mul(2_654_435_761)
                .rem_euclid(1000);
            *v = hash as f32 / 1000.0;
        }
        data
    }

    #[test]
    fn exact_crop_peaks_at_offset_with_unit_score() {
        let image = pattern(32, 40);
        let template = image.slice(s![5..17, 8..28]).to_owned();
        let surface = normxcorr_valid(image.view(), template.view()).unwrap();
        let mut best = (0, 0, f32::NEG_INFINITY);
        for ((y, x), &v) in surface.indexed_iter() {
            if v > best.2 {
                best = (y, x, v);
            }
        }
        assert_eq!((best.0, best.1), (5, 8));
        assert!(best.2 > 0.999, "peak score {}", best.2);
        // The true offset is strictly ahead of every other position.
        for ((y, x), &v) in surface.indexed_iter() {
            if (y, x) != (5, 8) {
                assert!(v < 0.999, "second peak at ({y}, {x}) = {v}");
            }
        }
    }

    #[test]
    fn flat_template_scores_zero() {
        let image = pattern(16, 16);
        let template = Array2::<f32>::from_elem((4, 4), 3.0);
        let surface = normxcorr_valid(image.view(), template.view()).unwrap();
        assert!(surface.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn oversized_template_is_rejected() {
        let image = pattern(8, 8);
        let template = pattern(9, 8);
        assert!(normxcorr_valid(image.view(), template.view()).is_err());
    }

    #[test]
    fn window_sums_match_direct_summation() {
        let data = pattern(9, 11);
        let sat = integral_image(data.view(), |v| v);
        let direct: f64 = data.slice(s![2..7, 3..9]).iter().map(|&v| v as f64).sum();
        assert!((window_sum(&sat, 2, 3, 5, 6) - direct).abs() < 1e-9);
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{debug, info, warn};

use crate::consts::QUEUE_DEPTH_PER_WORKER;
use crate::error::{MosaicError, Result};
use crate::io::TileReader;
use crate::pipeline::config::AlignConfig;
use crate::pipeline::progress::{ProgressReporter, StitchStage};
use crate::tile::{StitchAxis, Tile, TileGrid};

use super::xcorr::correlate_stack;

/// A single cross-correlation measurement request: one tile pair, one
/// sampled Z height. Pairs sampled at several heights produce several jobs.
#[derive(Clone, Debug)]
pub struct AlignJob {
    pub a: Tile,
    pub b: Tile,
    pub axis: StitchAxis,
    pub z_frame: usize,
}

/// Raw result of one alignment job.
///
/// Shifts are corrected for window trimming at measurement time: dz by the
/// (possibly clipped) Z half-window, dx by the lateral search margin; dy
/// needs no correction because the B-window trim is one-sided. A perfectly
/// aligned pair therefore measures (0, 0, 0).
#[derive(Clone, Debug)]
pub struct Measurement {
    pub a: String,
    pub b: String,
    pub axis: StitchAxis,
    pub dz: f64,
    pub dy: f64,
    pub dx: f64,
    pub score: f32,
}

/// A prefetched pair of overlap windows, ready for correlation.
struct WindowPair {
    job: AlignJob,
    a_window: Array3<f32>,
    b_window: Array2<f32>,
    z_center: usize,
}

/// Enumerate alignment jobs: consecutive tiles of every adjacency group
/// along both stitching axes, sampled at `z_samples` heights around the
/// center of the A stack.
pub fn build_jobs(grid: &TileGrid, config: &AlignConfig) -> Vec<AlignJob> {
    let mut jobs = Vec::new();
    let groupings = [
        (grid.tiles_along_x(), StitchAxis::X),
        (grid.tiles_along_y(), StitchAxis::Y),
    ];
    for (groups, axis) in groupings {
        for group in groups {
            for pair in group.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let stride = config.z_stride as i64;
                let samples = config.z_samples as i64;
                let central = a.nfrms as i64 / 2;
                // Even sample counts straddle the central frame.
                let start = central - samples / 2 * stride
                    + if samples % 2 == 0 { stride / 2 } else { 0 };
                let z_limit = a.nfrms.min(b.nfrms) as i64;
                for i in 0..samples {
                    let z_frame = start + i * stride;
                    if z_frame < 0 || z_frame >= z_limit {
                        warn!(
                            a = %a.filename,
                            b = %b.filename,
                            z_frame,
                            "Z sample outside the stack, skipped"
                        );
                        continue;
                    }
                    jobs.push(AlignJob {
                        a: a.clone(),
                        b: b.clone(),
                        axis,
                        z_frame: z_frame as usize,
                    });
                }
            }
        }
    }
    jobs
}

/// Rotate a frame 90° clockwise. For X-stitching both layers are rotated so
/// the stitching direction is always the row axis: the A tile's right border
/// strip becomes its last rows, the B tile's left strip its first rows.
fn rot90cw(frame: ArrayView2<f32>) -> Array2<f32> {
    let mut rotated = frame.t().to_owned();
    rotated.invert_axis(Axis(1));
    rotated
}

fn rot90cw_stack(stack: &Array3<f32>) -> Array3<f32> {
    let (depth, h, w) = stack.dim();
    let mut out = Array3::zeros((depth, w, h));
    for (z, frame) in stack.axis_iter(Axis(0)).enumerate() {
        out.index_axis_mut(Axis(0), z).assign(&rot90cw(frame));
    }
    out
}

/// Extract the overlap windows for one job.
///
/// A contributes a Z window of `2 * max_dz + 1` frames (clipped to the
/// stack) restricted to the `overlap` rows nearest the shared border; B
/// contributes a single frame strip at the same border, trimmed by `max_dy`
/// rows on the far side and `max_dx` columns laterally to bound the search.
fn extract_windows<R: TileReader + ?Sized>(
    reader: &R,
    job: &AlignJob,
    config: &AlignConfig,
) -> Result<WindowPair> {
    let overlap = config.overlap_for(job.axis);

    let z_lo = job.z_frame.saturating_sub(config.max_dz);
    let z_hi = (job.z_frame + config.max_dz + 1).min(job.a.nfrms);
    let mut a_window = reader.read_window(&job.a, z_lo, z_hi, config.channel)?;
    let mut b_frame = reader.read_frame(&job.b, job.z_frame, config.channel)?;

    if job.axis == StitchAxis::X {
        a_window = rot90cw_stack(&a_window);
        b_frame = rot90cw(b_frame.view());
    }

    let a_rows = a_window.shape()[1];
    let keep_a = overlap.min(a_rows);
    let a_window = a_window.slice(s![.., a_rows - keep_a.., ..]).to_owned();

    let b_rows = b_frame.nrows().min(overlap);
    let b_cols = b_frame.ncols();
    if b_rows <= config.max_dy || b_cols <= 2 * config.max_dx {
        return Err(MosaicError::Pipeline(format!(
            "overlap window {}x{} too small for search bounds (max_dy {}, max_dx {})",
            b_cols, b_rows, config.max_dy, config.max_dx
        )));
    }
    let b_window = b_frame
        .slice(s![..b_rows - config.max_dy, config.max_dx..b_cols - config.max_dx])
        .to_owned();

    Ok(WindowPair {
        job: job.clone(),
        a_window,
        b_window,
        z_center: job.z_frame - z_lo,
    })
}

/// Correlate one prefetched window pair and convert the peak into a
/// trim-corrected measurement.
fn correlate(pair: WindowPair, config: &AlignConfig) -> Result<Measurement> {
    let peak = correlate_stack(pair.a_window.view(), pair.b_window.view())?;
    Ok(Measurement {
        a: pair.job.a.filename,
        b: pair.job.b.filename,
        axis: pair.job.axis,
        dz: peak.z as f64 - pair.z_center as f64,
        dy: peak.y as f64,
        dx: peak.x as f64 - config.max_dx as f64,
        score: peak.score,
    })
}

/// Run the pairwise alignment pipeline over the whole grid.
///
/// A small pool of prefetch threads reads overlap windows and feeds a
/// bounded queue (blocking when full, so I/O throttles against compute);
/// rayon workers drain the queue and correlate. End of input is signalled
/// by channel disconnect, so every worker observes shutdown exactly once.
/// A job that fails to read or correlate is logged, counted complete and
/// emits no measurement; it never aborts the run.
pub fn run_alignment<R: TileReader>(
    reader: &R,
    grid: &TileGrid,
    config: &AlignConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Measurement>> {
    config.validate()?;
    if grid.is_empty() {
        return Err(MosaicError::EmptyGrid);
    }
    if config.equal_shape {
        grid.validate_equal_shape()?;
    }

    let jobs = build_jobs(grid, config);
    let total = jobs.len();
    info!(total_jobs = total, "starting pairwise alignment");
    reporter.begin_stage(StitchStage::Alignment, Some(total));

    let workers = if config.workers == 0 {
        rayon::current_num_threads()
    } else {
        config.workers
    };
    let (tx, rx) = mpsc::sync_channel::<WindowPair>(workers * QUEUE_DEPTH_PER_WORKER);
    let completed = AtomicUsize::new(0);

    let prefetch = config.prefetch.clamp(1, total.max(1));
    let chunk = total.div_ceil(prefetch).max(1);

    let measurements = thread::scope(|scope| {
        for slice in jobs.chunks(chunk) {
            let tx = tx.clone();
            let completed = &completed;
            scope.spawn(move || {
                for job in slice {
                    match extract_windows(reader, job, config) {
                        Ok(pair) => {
                            // Consumers gone means shutdown.
                            if tx.send(pair).is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(
                                a = %job.a.filename,
                                b = %job.b.filename,
                                z_frame = job.z_frame,
                                %err,
                                "alignment job skipped"
                            );
                            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                            reporter.advance(done);
                        }
                    }
                }
            });
        }
        drop(tx);

        rx.into_iter()
            .par_bridge()
            .filter_map(|pair| {
                let a = pair.job.a.filename.clone();
                let b = pair.job.b.filename.clone();
                let z_frame = pair.job.z_frame;
                let result = correlate(pair, config);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.advance(done);
                match result {
                    Ok(m) => {
                        debug!(
                            a = %m.a,
                            b = %m.b,
                            z_frame,
                            dz = m.dz,
                            dy = m.dy,
                            dx = m.dx,
                            score = m.score,
                            "measurement"
                        );
                        Some(m)
                    }
                    Err(err) => {
                        warn!(%a, %b, z_frame, %err, "correlation failed, job skipped");
                        None
                    }
                }
            })
            .collect()
    });

    reporter.finish_stage();
    Ok(measurements)
}

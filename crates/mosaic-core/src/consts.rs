/// Superellipse exponent of the innermost blending ring (pure ellipse).
pub const SQUIRCLE_MIN_EXPONENT: f64 = 2.0;

/// Superellipse exponent of the outermost blending ring (near-rectangular).
pub const SQUIRCLE_MAX_EXPONENT: f64 = 50.0;

/// Small epsilon below which a correlation denominator is treated as zero.
pub const XCORR_EPSILON: f64 = 1e-9;

/// Default maximum allowed shift along Z, in frames.
pub const DEFAULT_MAX_DZ: usize = 20;

/// Default maximum allowed shift along the stitching axis, in px.
pub const DEFAULT_MAX_DY: usize = 150;

/// Default maximum allowed lateral shift, in px.
pub const DEFAULT_MAX_DX: usize = 20;

/// Default nominal overlap along the vertical stitching axis, in px.
pub const DEFAULT_OVERLAP_V: usize = 600;

/// Default nominal overlap along the horizontal stitching axis, in px.
pub const DEFAULT_OVERLAP_H: usize = 600;

/// Default number of correlation samples taken along Z per tile pair.
pub const DEFAULT_Z_SAMPLES: usize = 1;

/// Default stride between Z samples, in frames.
pub const DEFAULT_Z_STRIDE: usize = 200;

/// Default number of I/O prefetch threads feeding the correlation workers.
pub const DEFAULT_PREFETCH_THREADS: usize = 2;

/// Window-pair queue capacity per correlation worker. The queue is bounded
/// so prefetch naturally throttles against compute.
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Fusion item queue capacity. Layers are large; keep at most this many
/// decoded tiles in flight ahead of the accumulator.
pub const FUSION_QUEUE_DEPTH: usize = 2;

/// Width of the tile boundary marker drawn in debug mode, in px.
pub const BORDER_MARKER_PX: usize = 2;

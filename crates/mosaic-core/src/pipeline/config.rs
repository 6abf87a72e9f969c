use serde::{Deserialize, Serialize};

use crate::align::AggregationMode;
use crate::consts::{
    DEFAULT_MAX_DX, DEFAULT_MAX_DY, DEFAULT_MAX_DZ, DEFAULT_OVERLAP_H, DEFAULT_OVERLAP_V,
    DEFAULT_PREFETCH_THREADS, DEFAULT_Z_SAMPLES, DEFAULT_Z_STRIDE,
};
use crate::error::{MosaicError, Result};
use crate::tile::StitchAxis;

/// Configuration of the pairwise alignment stage.
///
/// All distances are in pixels (frames for Z). `overlap_v`/`overlap_h` are
/// the nominal overlap extents along the Y and X stitching axes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Channel to correlate for multi-channel tiles.
    pub channel: Option<usize>,
    /// Maximum allowed shift along Z.
    pub max_dz: usize,
    /// Maximum allowed shift along the stitching axis.
    pub max_dy: usize,
    /// Maximum allowed lateral shift.
    pub max_dx: usize,
    pub overlap_v: usize,
    pub overlap_h: usize,
    /// Number of correlation samples along Z per tile pair.
    pub z_samples: usize,
    /// Stride between Z samples.
    pub z_stride: usize,
    #[serde(default)]
    pub mode: AggregationMode,
    /// Correlation worker threads; 0 uses every core.
    pub workers: usize,
    /// I/O prefetch threads feeding the work queue.
    pub prefetch: usize,
    /// Assume (and enforce) that all tiles share one frame shape.
    pub equal_shape: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            channel: None,
            max_dz: DEFAULT_MAX_DZ,
            max_dy: DEFAULT_MAX_DY,
            max_dx: DEFAULT_MAX_DX,
            overlap_v: DEFAULT_OVERLAP_V,
            overlap_h: DEFAULT_OVERLAP_H,
            z_samples: DEFAULT_Z_SAMPLES,
            z_stride: DEFAULT_Z_STRIDE,
            mode: AggregationMode::default(),
            workers: 0,
            prefetch: DEFAULT_PREFETCH_THREADS,
            equal_shape: true,
        }
    }
}

impl AlignConfig {
    /// Nominal overlap extent along a stitching axis.
    pub fn overlap_for(&self, axis: StitchAxis) -> usize {
        match axis {
            StitchAxis::Y => self.overlap_v,
            StitchAxis::X => self.overlap_h,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.z_samples == 0 {
            return Err(MosaicError::Config("z_samples must be at least 1".into()));
        }
        if self.z_samples > 1 && self.z_stride == 0 {
            return Err(MosaicError::Config(
                "z_stride must be positive with multiple Z samples".into(),
            ));
        }
        for (name, overlap) in [("overlap_v", self.overlap_v), ("overlap_h", self.overlap_h)] {
            if overlap <= self.max_dy {
                return Err(MosaicError::Config(format!(
                    "{name} ({overlap}) must exceed max_dy ({}), or the search window is empty",
                    self.max_dy
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of the fusion stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FuseConfig {
    /// Channel to fuse for multi-channel tiles.
    pub channel: Option<usize>,
    /// Saturate tile edges in the output for visual boundary debugging.
    #[serde(default)]
    pub debug_borders: bool,
}

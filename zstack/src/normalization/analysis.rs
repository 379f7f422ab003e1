//! Exploratory passes over a stack that do not write any output.

use std::path::{Path, PathBuf};

use super::error::{Error, Result};
use super::mask::NormalizationMask;
use super::statistics::{slice_mean, FilterPolicy};
use crate::image::{GrayImage, ImageCodec};

fn decode(codec: &dyn ImageCodec, path: &Path) -> Result<GrayImage> {
    codec.decode(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Reference mean of every slice, in the given order. `None` marks an empty population.
pub fn reference_mean_series(
    codec: &dyn ImageCodec,
    paths: &[PathBuf],
    policy: &FilterPolicy,
    mask: Option<&NormalizationMask>,
) -> Result<Vec<Option<f64>>> {
    paths
        .iter()
        .map(|path| slice_mean(&decode(codec, path)?, policy, mask))
        .collect()
}

/// Slices in which no pixel reaches `threshold`.
pub fn slices_below_threshold(
    codec: &dyn ImageCodec,
    paths: &[PathBuf],
    threshold: f32,
) -> Result<Vec<PathBuf>> {
    let mut below = Vec::new();
    for path in paths {
        let image = decode(codec, path)?;
        if image.pixels().iter().all(|&v| v < threshold || v.is_nan()) {
            below.push(path.clone());
        }
    }
    below.sort();

    Ok(below)
}

/// How much of a normalized stack carries signal above a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCoverage {
    /// Slices with every pixel below the threshold.
    pub below: usize,
    /// Slices in the normalized stack.
    pub total: usize,
    /// Whether the normalized stack has as many slices as its source stack.
    pub stacks_match: bool,
}

impl ThresholdCoverage {
    pub fn new(below: usize, normalized: usize, source: usize) -> Self {
        Self {
            below,
            total: normalized,
            stacks_match: normalized == source,
        }
    }

    pub fn all_below(&self) -> bool {
        self.total > 0 && self.below == self.total
    }

    /// Share of slices with at least one pixel at or above the threshold, in percent.
    pub fn percent_above(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.below) as f64 / self.total as f64 * 100.0
    }
}

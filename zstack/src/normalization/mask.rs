//! Foreground mask voted across a reference stack.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::error::{Error, Result};
use super::progress::{report_progress, NormalizationStage, ProgressCallback};
use crate::image::{GrayImage, ImageCodec, ImageDimensions};

/// Per-pixel "valid foreground" indicator shared by every slice of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationMask {
    dimensions: ImageDimensions,
    foreground: Vec<bool>,
}

impl NormalizationMask {
    pub fn from_vec(dimensions: ImageDimensions, foreground: Vec<bool>) -> Result<Self> {
        if foreground.len() != dimensions.pixel_count() {
            return Err(Error::InvalidConfig(format!(
                "mask holds {} pixels, {} needs {}",
                foreground.len(),
                dimensions,
                dimensions.pixel_count()
            )));
        }
        Ok(Self {
            dimensions,
            foreground,
        })
    }

    pub fn dimensions(&self) -> ImageDimensions {
        self.dimensions
    }

    #[inline]
    pub fn is_foreground(&self, index: usize) -> bool {
        self.foreground[index]
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.foreground
    }

    pub fn foreground_count(&self) -> usize {
        self.foreground.iter().filter(|&&f| f).count()
    }

    pub(crate) fn check_shape(&self, slice: ImageDimensions) -> Result<()> {
        if self.dimensions != slice {
            return Err(Error::MaskShape {
                mask: self.dimensions,
                slice,
            });
        }
        Ok(())
    }
}

/// Running per-pixel count of slices in which each pixel is positive.
#[derive(Debug)]
pub struct MaskAccumulator {
    dimensions: ImageDimensions,
    counts: Vec<u32>,
    slices: usize,
}

impl MaskAccumulator {
    pub fn new(dimensions: ImageDimensions) -> Self {
        Self {
            dimensions,
            counts: vec![0; dimensions.pixel_count()],
            slices: 0,
        }
    }

    pub fn slices(&self) -> usize {
        self.slices
    }

    /// Adds one slice to the vote. `path` is used for error reporting only.
    pub fn add(&mut self, image: &GrayImage, path: &Path) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(Error::DimensionMismatch {
                path: path.to_path_buf(),
                expected: self.dimensions,
                actual: image.dimensions(),
            });
        }

        self.counts
            .par_iter_mut()
            .zip(image.pixels().par_iter())
            .for_each(|(count, &v)| {
                if v > 0.0 {
                    *count += 1;
                }
            });
        self.slices += 1;

        Ok(())
    }

    /// A pixel is foreground iff the fraction of slices where it was positive is at least `cutoff`.
    pub fn finish(self, cutoff: f32) -> Result<NormalizationMask> {
        validate_cutoff(cutoff)?;
        if self.slices == 0 {
            return Err(Error::EmptyStack);
        }

        let slices = self.slices as f64;
        let cutoff = cutoff as f64;
        let foreground = self
            .counts
            .par_iter()
            .map(|&count| count as f64 / slices >= cutoff)
            .collect();

        Ok(NormalizationMask {
            dimensions: self.dimensions,
            foreground,
        })
    }
}

fn validate_cutoff(cutoff: f32) -> Result<()> {
    if (0.0..=1.0).contains(&cutoff) {
        Ok(())
    } else {
        Err(Error::InvalidMaskCutoff(cutoff))
    }
}

/// Builds a mask from already decoded reference slices.
pub fn build_mask(images: &[GrayImage], cutoff: f32) -> Result<NormalizationMask> {
    validate_cutoff(cutoff)?;
    let first = images.first().ok_or(Error::EmptyStack)?;

    let mut acc = MaskAccumulator::new(first.dimensions());
    for (i, image) in images.iter().enumerate() {
        acc.add(image, &PathBuf::from(format!("#{}", i)))?;
    }
    acc.finish(cutoff)
}

/// Builds a mask by decoding each reference slice once, holding one slice in memory at a time.
pub fn build_mask_from_paths(
    codec: &dyn ImageCodec,
    paths: &[PathBuf],
    cutoff: f32,
    progress: &ProgressCallback,
) -> Result<NormalizationMask> {
    validate_cutoff(cutoff)?;
    if paths.is_empty() {
        return Err(Error::EmptyStack);
    }

    let mut acc: Option<MaskAccumulator> = None;
    for (i, path) in paths.iter().enumerate() {
        let image = codec.decode(path).map_err(|source| Error::Decode {
            path: path.clone(),
            source,
        })?;
        acc.get_or_insert_with(|| MaskAccumulator::new(image.dimensions()))
            .add(&image, path)?;
        report_progress(progress, i + 1, paths.len(), NormalizationStage::BuildingMask);
    }

    let mask = acc.ok_or(Error::EmptyStack)?.finish(cutoff)?;
    tracing::info!(
        slices = paths.len(),
        cutoff,
        foreground = mask.foreground_count(),
        total = mask.dimensions().pixel_count(),
        "Built reference mask"
    );

    Ok(mask)
}

//! Normalization of one target slice by its paired reference slice.

use std::path::{Path, PathBuf};

use super::error::{Error, Result};
use super::mask::NormalizationMask;
use super::naming::OutputNaming;
use super::statistics::{slice_mean, FilterPolicy};
use super::z_index::ZIndex;
use crate::image::{GrayImage, ImageCodec};

/// One written output slice.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSlice {
    pub path: PathBuf,
    pub z_index: ZIndex,
    /// Reference mean the target was divided by. `None` when the reference had
    /// no valid pixels; the written slice is then all zero (integer types) or NaN (float).
    pub reference_mean: Option<f64>,
}

/// Everything a single slice needs that stays fixed across the run.
pub struct SliceNormalizer<'a> {
    pub codec: &'a dyn ImageCodec,
    pub output_dir: &'a Path,
    pub naming: &'a OutputNaming,
    pub policy: &'a FilterPolicy,
    pub mask: Option<&'a NormalizationMask>,
}

impl SliceNormalizer<'_> {
    /// Decodes both slices, divides the clamped target by the reference mean and writes the result.
    pub fn normalize(&self, target: &Path, reference: &Path, z: ZIndex) -> Result<NormalizedSlice> {
        let mut image = decode(self.codec, target)?;
        clamp_to_bounds(&mut image, self.policy);

        let reference_image = decode(self.codec, reference)?;
        if reference_image.dimensions() != image.dimensions() {
            return Err(Error::DimensionMismatch {
                path: reference.to_path_buf(),
                expected: image.dimensions(),
                actual: reference_image.dimensions(),
            });
        }

        let reference_mean = slice_mean(&reference_image, self.policy, self.mask)?;
        drop(reference_image);

        match reference_mean {
            Some(mean) => scale(&mut image, mean),
            None => {
                tracing::warn!(
                    reference = %reference.display(),
                    z = %z,
                    "Reference slice has no valid pixels; statistic undefined"
                );
                scale(&mut image, f64::NAN);
            }
        }

        let path = self.output_dir.join(self.naming.slice_file_name(z));
        self.codec
            .encode(&image, &path)
            .map_err(|source| Error::Encode {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), z = %z, ?reference_mean, "Wrote normalized slice");

        Ok(NormalizedSlice {
            path,
            z_index: z,
            reference_mean,
        })
    }
}

fn decode(codec: &dyn ImageCodec, path: &Path) -> Result<GrayImage> {
    codec.decode(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Zeroes target pixels outside the policy bounds. Independent of `policy.raw`.
pub fn clamp_to_bounds(image: &mut GrayImage, policy: &FilterPolicy) {
    for v in image.pixels_mut() {
        if !policy.within_bounds(*v) {
            *v = 0.0;
        }
    }
}

/// Divides by `divisor` and quantizes back to the image's own sample type.
fn scale(image: &mut GrayImage, divisor: f64) {
    let sample_type = image.sample_type();
    for v in image.pixels_mut() {
        *v = sample_type.quantize((*v as f64 / divisor) as f32);
    }
}

//! Per-slice statistics over the valid pixels of a reference slice.
//!
//! Every variant goes through [`valid_pixels`], so masking and filtering can
//! never diverge between the mean used for normalization and the exploratory
//! statistics.

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::mask::NormalizationMask;
use crate::image::GrayImage;
use crate::math;

/// Which pixels of a reference slice take part in its statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Pixels below this value are excluded.
    pub lower_bound: f32,
    /// Pixels above this value are excluded. `None` is unbounded.
    pub upper_bound: Option<f32>,
    /// Second pass: drop pixels further than this many standard deviations
    /// from the mean of the bound-filtered population.
    pub outlier_std_devs: Option<f32>,
    /// Skip bounds and outlier rejection. Mask and zero exclusion still apply.
    pub raw: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: None,
            outlier_std_devs: None,
            raw: false,
        }
    }
}

impl FilterPolicy {
    /// Policy that keeps every nonzero pixel.
    pub fn raw() -> Self {
        Self {
            raw: true,
            ..Self::default()
        }
    }

    #[inline]
    pub fn within_bounds(&self, value: f32) -> bool {
        value >= self.lower_bound && self.upper_bound.is_none_or(|upper| value <= upper)
    }
}

/// Summary of a slice's valid-pixel distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceDistribution {
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
    /// Population variance.
    pub variance: f64,
    /// Number of valid pixels.
    pub count: usize,
}

/// Selects the valid pixels of `image` and returns their values.
///
/// A pixel is valid when it lies inside `mask` (if any), is nonzero and not NaN,
/// and, unless `policy.raw` is set, lies within the policy bounds and survives
/// outlier rejection.
pub fn valid_pixels(
    image: &GrayImage,
    policy: &FilterPolicy,
    mask: Option<&NormalizationMask>,
) -> Result<Vec<f32>> {
    if let Some(mask) = mask {
        mask.check_shape(image.dimensions())?;
    }

    let mut values: Vec<f32> = image
        .pixels()
        .iter()
        .enumerate()
        .filter(|&(i, _)| mask.is_none_or(|m| m.is_foreground(i)))
        .map(|(_, &v)| v)
        .filter(|&v| v != 0.0 && !v.is_nan())
        .filter(|&v| policy.raw || policy.within_bounds(v))
        .collect();

    if !policy.raw {
        if let Some(k) = policy.outlier_std_devs {
            reject_outliers(&mut values, k);
        }
    }

    Ok(values)
}

/// Keeps values within `mean ± k·σ` of the current population. Single pass.
fn reject_outliers(values: &mut Vec<f32>, k: f32) {
    let Some((mean, std)) = math::mean_and_std(values) else {
        return;
    };
    let limit = k as f64 * std;
    values.retain(|&v| (v as f64 - mean).abs() <= limit);
}

/// Mean of the valid pixels, or `None` when no pixel survives filtering.
pub fn slice_mean(
    image: &GrayImage,
    policy: &FilterPolicy,
    mask: Option<&NormalizationMask>,
) -> Result<Option<f64>> {
    let values = valid_pixels(image, policy, mask)?;
    Ok(math::mean(&values))
}

/// Mean, median, extremes and variance of the valid pixels, or `None` when empty.
pub fn slice_distribution(
    image: &GrayImage,
    policy: &FilterPolicy,
    mask: Option<&NormalizationMask>,
) -> Result<Option<SliceDistribution>> {
    let mut values = valid_pixels(image, policy, mask)?;

    let Some(mean) = math::mean(&values) else {
        return Ok(None);
    };
    let variance = math::variance_with_mean(&values, mean);
    let Some((min, max)) = math::min_max(&values) else {
        return Ok(None);
    };
    let count = values.len();
    let Some(median) = math::median_mut(&mut values) else {
        return Ok(None);
    };

    Ok(Some(SliceDistribution {
        mean,
        median,
        max: max as f64,
        min: min as f64,
        variance,
        count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageDimensions, SampleType};

    fn image(values: &[f32]) -> GrayImage {
        GrayImage::new(
            ImageDimensions::new(values.len(), 1),
            SampleType::U16,
            values.to_vec(),
        )
        .unwrap()
    }

    fn mask(bits: &[bool]) -> NormalizationMask {
        NormalizationMask::from_vec(ImageDimensions::new(bits.len(), 1), bits.to_vec()).unwrap()
    }

    #[test]
    fn raw_mean_is_mean_of_nonzero_pixels() {
        let img = image(&[0.0, 2.0, 0.0, 4.0, 9.0, 0.0]);
        let mean = slice_mean(&img, &FilterPolicy::raw(), None).unwrap();
        assert_eq!(mean, Some(5.0));
    }

    #[test]
    fn raw_mode_ignores_bounds_and_outliers() {
        let img = image(&[1.0, 2.0, 3.0, 1000.0]);
        let policy = FilterPolicy {
            lower_bound: 2.0,
            upper_bound: Some(3.0),
            outlier_std_devs: Some(0.5),
            raw: true,
        };
        assert_eq!(slice_mean(&img, &policy, None).unwrap(), Some(251.5));
    }

    #[test]
    fn bounds_are_inclusive() {
        let img = image(&[5.0, 10.0, 15.0, 20.0, 25.0]);
        let policy = FilterPolicy {
            lower_bound: 10.0,
            upper_bound: Some(20.0),
            ..Default::default()
        };
        assert_eq!(
            valid_pixels(&img, &policy, None).unwrap(),
            vec![10.0, 15.0, 20.0]
        );
    }

    #[test]
    fn outliers_are_rejected_after_bounds() {
        // Bound filtering drops the 1s first; the 500 is then an outlier of the rest.
        let mut values = vec![1.0f32; 20];
        values.extend([100.0; 9]);
        values.push(500.0);
        let img = image(&values);
        let policy = FilterPolicy {
            lower_bound: 50.0,
            outlier_std_devs: Some(2.0),
            ..Default::default()
        };

        let kept = valid_pixels(&img, &policy, None).unwrap();
        assert_eq!(kept, vec![100.0; 9]);
    }

    #[test]
    fn outlier_rejection_is_two_sided() {
        let mut values = vec![100.0f32; 10];
        values.push(1.0);
        values.push(199.0);
        values.extend([100.0; 10]);
        values.push(400.0);
        let img = image(&values);
        let policy = FilterPolicy {
            outlier_std_devs: Some(1.0),
            ..Default::default()
        };

        let kept = valid_pixels(&img, &policy, None).unwrap();
        assert!(kept.iter().all(|&v| v == 100.0));
        assert_eq!(kept.len(), 20);
    }

    #[test]
    fn mask_excludes_background_pixels() {
        let img = image(&[10.0, 20.0, 30.0, 40.0]);
        let m = mask(&[true, false, true, false]);
        let mean = slice_mean(&img, &FilterPolicy::default(), Some(&m)).unwrap();
        assert_eq!(mean, Some(20.0));
    }

    #[test]
    fn mask_shape_must_match() {
        let img = image(&[1.0, 2.0]);
        let m = mask(&[true, true, true]);
        assert!(slice_mean(&img, &FilterPolicy::default(), Some(&m)).is_err());
    }

    #[test]
    fn empty_population_is_none_not_error() {
        let img = image(&[0.0, 3.0, 4.0]);
        let policy = FilterPolicy {
            lower_bound: 10.0,
            ..Default::default()
        };
        assert_eq!(slice_mean(&img, &policy, None).unwrap(), None);
        assert_eq!(slice_distribution(&img, &policy, None).unwrap(), None);
    }

    #[test]
    fn distribution_of_valid_pixels() {
        let img = image(&[0.0, 1.0, 2.0, 3.0, 4.0, 100.0]);
        let policy = FilterPolicy {
            lower_bound: 1.0,
            upper_bound: Some(4.0),
            ..Default::default()
        };

        let dist = slice_distribution(&img, &policy, None).unwrap().unwrap();
        assert_eq!(dist.count, 4);
        assert_eq!(dist.mean, 2.5);
        assert_eq!(dist.median, 2.5);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 4.0);
        assert!((dist.variance - 1.25).abs() < 1e-12);
    }

    #[test]
    fn nan_pixels_are_never_valid() {
        let img = GrayImage::new(
            ImageDimensions::new(3, 1),
            SampleType::F32,
            vec![f32::NAN, 2.0, 4.0],
        )
        .unwrap();
        assert_eq!(
            slice_mean(&img, &FilterPolicy::raw(), None).unwrap(),
            Some(3.0)
        );
    }
}

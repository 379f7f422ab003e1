//! Normalization run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{Error, Result};
use super::statistics::FilterPolicy;
use super::z_index::ZIndexMatcher;

/// Default fraction of reference slices in which a pixel must be nonzero to count as foreground.
pub const DEFAULT_MASK_CUTOFF: f32 = 0.7;

/// What to do when one slice pair fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run at the first failing slice.
    #[default]
    FailFast,
    /// Process every pair, then report all failures together.
    Continue,
}

/// Configuration for normalizing a target stack against a reference stack.
///
/// # Examples
///
/// ```ignore
/// use zstack::{normalize_stack, NormalizationConfig};
///
/// let config = NormalizationConfig {
///     threshold: 100.0,
///     outlier_std_devs: Some(3.0),
///     mask_from_reference: true,
///     ..Default::default()
/// };
/// let manifest = normalize_stack(&targets, &references, &config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Lower intensity bound. Reference pixels below it are ignored, target pixels below it are zeroed.
    pub threshold: f32,
    /// Optional upper intensity bound, applied like `threshold` on the other side.
    pub upper_bound: Option<f32>,
    /// Reject reference pixels further than this many standard deviations from the mean.
    /// A negative value in a config file (conventionally `-1`) disables rejection.
    #[serde(deserialize_with = "deserialize_outlier_std_devs")]
    pub outlier_std_devs: Option<f32>,
    /// Skip bound and outlier filtering when computing the reference statistic.
    pub raw_normalization: bool,
    /// Restrict the reference statistic to a foreground mask voted from the reference stack.
    pub mask_from_reference: bool,
    /// Voting cutoff for the foreground mask, within [0, 1].
    pub mask_cutoff: f32,
    /// Output directory. Defaults to a sibling of the target directory with a derived name.
    pub output_dir: Option<PathBuf>,
    /// Recompute even when the output directory already exists.
    pub regenerate: bool,
    /// Override for the number of trailing digits read as the Z-index.
    pub z_index_digits: Option<usize>,
    /// Normalize slice pairs on the rayon thread pool.
    pub parallel: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            upper_bound: None,
            outlier_std_devs: None,
            raw_normalization: false,
            mask_from_reference: false,
            mask_cutoff: DEFAULT_MASK_CUTOFF,
            output_dir: None,
            regenerate: false,
            z_index_digits: None,
            parallel: true,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl NormalizationConfig {
    /// Loads a YAML or JSON config, chosen by file extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = common::FileFormat::from_file_name(&path.to_string_lossy())?;
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = common::deserialize(&text, format)?;
        config.validate()?;

        Ok(config)
    }

    /// Sets the outlier multiplier; a negative value disables rejection.
    pub fn set_outlier_std_devs(&mut self, std_devs: f32) {
        self.outlier_std_devs = outlier_setting(std_devs);
    }

    /// Pixel filtering policy derived from this config.
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            lower_bound: self.threshold,
            upper_bound: self.upper_bound,
            outlier_std_devs: self.outlier_std_devs,
            raw: self.raw_normalization,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mask_cutoff) {
            return Err(Error::InvalidMaskCutoff(self.mask_cutoff));
        }
        if !self.threshold.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if let Some(upper) = self.upper_bound {
            if upper.is_nan() || upper < self.threshold {
                return Err(Error::InvalidConfig(format!(
                    "upper bound {} is below threshold {}",
                    upper, self.threshold
                )));
            }
        }
        if let Some(k) = self.outlier_std_devs {
            if !(k.is_finite() && k > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "outlier standard deviations must be positive, got {}",
                    k
                )));
            }
        }
        if let Some(digits) = self.z_index_digits {
            ZIndexMatcher::new(digits)?;
        }

        Ok(())
    }
}

fn outlier_setting(std_devs: f32) -> Option<f32> {
    if std_devs < 0.0 {
        None
    } else {
        Some(std_devs)
    }
}

fn deserialize_outlier_std_devs<'de, D>(deserializer: D) -> std::result::Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f32>::deserialize(deserializer)?.and_then(outlier_setting))
}

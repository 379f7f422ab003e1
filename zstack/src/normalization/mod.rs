//! Reference-channel normalization of Z-stacks.
//!
//! Each target slice is divided by the mean of the valid pixels of its paired
//! reference slice. Pairing is by sorted path order, cross-checked against the
//! Z-index in both file names.

mod analysis;
mod config;
mod error;
mod mask;
mod naming;
mod orchestrator;
mod progress;
mod slice;
mod statistics;
mod z_index;

#[cfg(test)]
mod tests;

pub use analysis::{reference_mean_series, slices_below_threshold, ThresholdCoverage};
pub use config::{FailurePolicy, NormalizationConfig, DEFAULT_MASK_CUTOFF};
pub use error::{Error, FailureReport, Result, SliceFailure};
pub use mask::{build_mask, build_mask_from_paths, MaskAccumulator, NormalizationMask};
pub use naming::OutputNaming;
pub use orchestrator::{normalize_stack, OutputManifest, StackNormalizer};
pub use progress::{NormalizationProgress, NormalizationStage, ProgressCallback};
pub use slice::{clamp_to_bounds, NormalizedSlice, SliceNormalizer};
pub use statistics::{
    slice_distribution, slice_mean, valid_pixels, FilterPolicy, SliceDistribution,
};
pub use z_index::{ZIndex, ZIndexMatcher, MAX_Z_INDEX_DIGITS, RESERVED_Z_INDEX_DIGITS};

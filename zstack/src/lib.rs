//! Zstack - reference-channel normalization of grayscale Z-stacks.
//!
//! Brightness in volumetric scans drifts from slice to slice. This library
//! corrects a target stack by dividing each slice by a statistic of the paired
//! slice in a reference stack, and provides:
//! - Foreground mask voting across the reference stack
//! - Per-slice statistics with bound, outlier and mask filtering
//! - Z-index cross-checking of paired file names
//! - Idempotent whole-stack runs with deterministic output names
//! - Sharp-change detection on derived 1D series
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use zstack::{normalize_stack, NormalizationConfig};
//!
//! let targets = common::file_utils::image_files("data/soi".as_ref())?;
//! let references = common::file_utils::image_files("data/dapi".as_ref())?;
//!
//! let config = NormalizationConfig {
//!     threshold: 100.0,
//!     mask_from_reference: true,
//!     ..Default::default()
//! };
//! let manifest = normalize_stack(&targets, &references, &config)?;
//! println!("Wrote {} slices to {}", manifest.len(), manifest.output_dir.display());
//! ```

pub mod change_detection;
pub mod image;
pub(crate) mod math;
pub mod normalization;

pub mod prelude;

// ============================================================================
// Images
// ============================================================================

pub use image::{FileCodec, GrayImage, ImageCodec, ImageDimensions, SampleType};

// ============================================================================
// Normalization
// ============================================================================

pub use normalization::{
    // Configuration
    FailurePolicy,
    FilterPolicy,
    NormalizationConfig,
    // Errors
    Error,
    FailureReport,
    // Building blocks
    NormalizationMask,
    NormalizedSlice,
    OutputManifest,
    OutputNaming,
    SliceDistribution,
    ZIndex,
    ZIndexMatcher,
    // Progress reporting
    NormalizationProgress,
    NormalizationStage,
    ProgressCallback,
    // Main API
    StackNormalizer,
    build_mask,
    build_mask_from_paths,
    normalize_stack,
    reference_mean_series,
    slice_distribution,
    slice_mean,
    slices_below_threshold,
    valid_pixels,
};

// ============================================================================
// Change detection
// ============================================================================

pub use change_detection::{
    Direction, SharpChange, detect_sharp_changes, detect_sharp_changes_in_series,
};

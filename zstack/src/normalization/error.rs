//! Error types for stack normalization.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::z_index::ZIndex;
use super::NormalizedSlice;
use crate::image::{self, ImageDimensions};

/// Errors that can occur while normalizing a stack.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No slices provided for normalization")]
    EmptyStack,

    #[error("Stack sizes differ: {targets} target slices, {references} reference slices")]
    CountMismatch { targets: usize, references: usize },

    #[error("Failed to decode slice '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::Error,
    },

    #[error("Failed to write slice '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::Error,
    },

    #[error(
        "Z-value for target slice ({target}) is not equal to Z-value for reference slice ({reference})"
    )]
    ZIndexMismatch { target: ZIndex, reference: ZIndex },

    #[error("No Z-index digits in file name '{path}'")]
    MissingZIndex { path: PathBuf },

    #[error("Dimension mismatch for '{path}': expected {expected}, got {actual}")]
    DimensionMismatch {
        path: PathBuf,
        expected: ImageDimensions,
        actual: ImageDimensions,
    },

    #[error("Mask is {mask}, slice is {slice}")]
    MaskShape {
        mask: ImageDimensions,
        slice: ImageDimensions,
    },

    #[error("Mask cutoff must be within [0, 1], got {0}")]
    InvalidMaskCutoff(f32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unrecognized config file: {0}")]
    ConfigFormat(#[from] common::FileExtensionError),

    #[error("Failed to parse config: {0}")]
    ParseConfig(#[from] common::SerdeFormatError),

    #[error("Failed to create output directory '{path}': {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Normalization cancelled after {completed} slices")]
    Cancelled { completed: usize },

    #[error("{report}")]
    Incomplete { report: FailureReport },
}

pub type Result<T> = std::result::Result<T, Error>;

/// One slice pair that could not be normalized.
#[derive(Debug)]
pub struct SliceFailure {
    pub target: PathBuf,
    pub reference: PathBuf,
    pub error: Error,
}

/// Outcome of a run that kept going past per-slice failures.
#[derive(Debug, Default)]
pub struct FailureReport {
    /// Slices that were written successfully, in stack order.
    pub written: Vec<NormalizedSlice>,
    /// Slices that failed, in stack order.
    pub failures: Vec<SliceFailure>,
}

impl FailureReport {
    pub fn total(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} slices failed",
            self.failures.len(),
            self.total()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.target.display(), failure.error)?;
        }
        Ok(())
    }
}

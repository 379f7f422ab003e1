//! Deterministic output directory and slice file names.
//!
//! The same inputs and configuration always produce the same names, which is
//! what lets a re-run find and reuse an earlier output directory.

use std::path::{Path, PathBuf};

use common::file_utils::parent_dir_name;

use super::config::NormalizationConfig;
use super::z_index::ZIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct OutputNaming {
    target_dir: String,
    reference_dir: String,
    raw: bool,
    masked: bool,
    threshold: f32,
    outlier_std_devs: Option<f32>,
}

impl OutputNaming {
    /// Names derived from the directories holding the first target and reference slices.
    pub fn new(first_target: &Path, first_reference: &Path, config: &NormalizationConfig) -> Self {
        Self {
            target_dir: parent_dir_name(first_target),
            reference_dir: parent_dir_name(first_reference),
            raw: config.raw_normalization,
            masked: config.mask_from_reference,
            threshold: config.threshold,
            outlier_std_devs: config.outlier_std_devs,
        }
    }

    /// `n_` or `rn_`, followed by `im_` when a reference mask is in use.
    pub fn mode_prefix(&self) -> String {
        let mode = if self.raw { "rn_" } else { "n_" };
        let mask = if self.masked { "im_" } else { "" };
        format!("{}{}", mode, mask)
    }

    pub fn dir_name(&self) -> String {
        let mut name = format!(
            "{}_{}{}",
            self.target_dir,
            self.mode_prefix(),
            self.reference_dir
        );
        if self.threshold != 0.0 {
            name.push_str(&format!("_t{}", self.threshold));
        }
        if let Some(k) = self.outlier_std_devs {
            name.push_str(&format!("_{}std", k));
        }
        name
    }

    pub fn slice_file_name(&self, z: ZIndex) -> String {
        format!(
            "{}_{}{}_mean_{}.tiff",
            self.target_dir,
            self.mode_prefix(),
            self.reference_dir,
            z
        )
    }

    /// Sibling of the target directory named by [`Self::dir_name`].
    pub fn default_output_dir(&self, first_target: &Path) -> PathBuf {
        let stack_parent = first_target
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        stack_parent.join(self.dir_name())
    }
}

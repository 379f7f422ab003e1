//! Whole-stack normalization entry point.
//!
//! Provides [`normalize_stack`] and the configurable [`StackNormalizer`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use common::CancelToken;
use rayon::prelude::*;

use super::config::{FailurePolicy, NormalizationConfig};
use super::error::{Error, FailureReport, Result, SliceFailure};
use super::mask::build_mask_from_paths;
use super::naming::OutputNaming;
use super::progress::{report_progress, NormalizationStage, ProgressCallback};
use super::slice::{NormalizedSlice, SliceNormalizer};
use super::z_index::ZIndexMatcher;
use crate::image::{FileCodec, ImageCodec};

/// Ordered list of output slice files produced (or found) for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputManifest {
    pub output_dir: PathBuf,
    /// One path per normalized slice, in stack order.
    pub paths: Vec<PathBuf>,
    /// Outputs computed in this run whose reference slice had no valid pixels.
    /// Reused slices are not re-read, so they never appear here.
    pub undefined_reference: Vec<PathBuf>,
    /// Number of slices found already written by an earlier run and not recomputed.
    pub reused: usize,
}

impl OutputManifest {
    /// Merges reused paths (`Some`, by pair position) with freshly computed slices in stack order.
    fn assemble(
        output_dir: PathBuf,
        existing: Vec<Option<PathBuf>>,
        slices: Vec<NormalizedSlice>,
    ) -> Self {
        let undefined_reference = slices
            .iter()
            .filter(|s| s.reference_mean.is_none())
            .map(|s| s.path.clone())
            .collect();
        let reused = existing.iter().filter(|p| p.is_some()).count();
        let mut fresh = slices.into_iter().map(|s| s.path);
        let paths = existing
            .into_iter()
            .filter_map(|path| path.or_else(|| fresh.next()))
            .collect();

        Self {
            output_dir,
            paths,
            undefined_reference,
            reused,
        }
    }

    /// `true` when every slice came from an earlier run.
    pub fn is_fully_reused(&self) -> bool {
        !self.paths.is_empty() && self.reused == self.paths.len()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Normalize a target stack against a reference stack with the default file codec.
///
/// # Errors
///
/// Returns an error if:
/// - Either stack is empty or the stacks differ in length
/// - A slice fails to decode, or its Z-index disagrees with its partner
/// - The output directory cannot be created or written
pub fn normalize_stack(
    targets: &[PathBuf],
    references: &[PathBuf],
    config: &NormalizationConfig,
) -> Result<OutputManifest> {
    StackNormalizer::new(config).run(targets, references)
}

/// Drives a whole normalization run: output directory reuse, mask building and the per-pair loop.
pub struct StackNormalizer<'a> {
    config: &'a NormalizationConfig,
    codec: &'a dyn ImageCodec,
    progress: ProgressCallback,
    cancel: CancelToken,
}

impl<'a> StackNormalizer<'a> {
    pub fn new(config: &'a NormalizationConfig) -> Self {
        Self {
            config,
            codec: &FileCodec,
            progress: ProgressCallback::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_codec(mut self, codec: &'a dyn ImageCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Cancellation is honored between slices, never inside one.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self, targets: &[PathBuf], references: &[PathBuf]) -> Result<OutputManifest> {
        let config = self.config;
        config.validate()?;

        if targets.is_empty() || references.is_empty() {
            return Err(Error::EmptyStack);
        }
        if targets.len() != references.len() {
            return Err(Error::CountMismatch {
                targets: targets.len(),
                references: references.len(),
            });
        }

        let mut targets = targets.to_vec();
        let mut references = references.to_vec();
        targets.sort();
        references.sort();

        let naming = OutputNaming::new(&targets[0], &references[0], config);
        let output_dir = config
            .output_dir
            .clone()
            .unwrap_or_else(|| naming.default_output_dir(&targets[0]));

        let resume = output_dir.is_dir() && !config.regenerate;
        if output_dir.is_dir() {
            if config.regenerate {
                tracing::info!(dir = %output_dir.display(), "Regenerating normalized slices");
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(|source| Error::CreateOutputDir {
                path: output_dir.clone(),
                source,
            })?;
        }

        let matcher = match config.z_index_digits {
            Some(digits) => ZIndexMatcher::new(digits)?,
            None => ZIndexMatcher::for_stack_len(targets.len()),
        };

        let pairs: Vec<(&Path, &Path)> = targets
            .iter()
            .map(PathBuf::as_path)
            .zip(references.iter().map(PathBuf::as_path))
            .collect();

        // Output of an earlier run for each pair, if it is already on disk.
        let existing: Vec<Option<PathBuf>> = pairs
            .iter()
            .map(|&(target, reference)| {
                if !resume {
                    return None;
                }
                matcher
                    .check_pair(target, reference)
                    .ok()
                    .map(|z| output_dir.join(naming.slice_file_name(z)))
                    .filter(|path| path.is_file())
            })
            .collect();
        let pending: Vec<(&Path, &Path)> = pairs
            .iter()
            .zip(&existing)
            .filter(|(_, path)| path.is_none())
            .map(|(&pair, _)| pair)
            .collect();

        if pending.is_empty() {
            tracing::info!(
                dir = %output_dir.display(),
                slices = pairs.len(),
                "Output directory complete, reusing normalized slices"
            );
            return Ok(OutputManifest::assemble(output_dir, existing, Vec::new()));
        }
        if pending.len() < pairs.len() {
            tracing::info!(
                dir = %output_dir.display(),
                reused = pairs.len() - pending.len(),
                remaining = pending.len(),
                "Resuming partially written output"
            );
        }

        let mask = if config.mask_from_reference {
            Some(build_mask_from_paths(
                self.codec,
                &references,
                config.mask_cutoff,
                &self.progress,
            )?)
        } else {
            None
        };

        let policy = config.filter_policy();
        let normalizer = SliceNormalizer {
            codec: self.codec,
            output_dir: &output_dir,
            naming: &naming,
            policy: &policy,
            mask: mask.as_ref(),
        };

        let total = pending.len();
        tracing::info!(
            dir = %output_dir.display(),
            slices = total,
            name = %naming.dir_name(),
            parallel = config.parallel,
            "Normalizing stack"
        );

        let done = AtomicUsize::new(0);

        let process = |&(target, reference): &(&Path, &Path)| -> Result<NormalizedSlice> {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    completed: done.load(Ordering::SeqCst),
                });
            }
            let z = matcher.check_pair(target, reference)?;
            let slice = normalizer.normalize(target, reference, z)?;
            let current = done.fetch_add(1, Ordering::SeqCst) + 1;
            report_progress(&self.progress, current, total, NormalizationStage::Normalizing);
            Ok(slice)
        };

        let slices = match config.failure_policy {
            FailurePolicy::FailFast => {
                if config.parallel {
                    pending.par_iter().map(process).collect::<Result<Vec<_>>>()?
                } else {
                    pending.iter().map(process).collect::<Result<Vec<_>>>()?
                }
            }
            FailurePolicy::Continue => {
                let outcomes: Vec<Result<NormalizedSlice>> = if config.parallel {
                    pending.par_iter().map(process).collect()
                } else {
                    pending.iter().map(process).collect()
                };
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled {
                        completed: done.load(Ordering::SeqCst),
                    });
                }
                collect_outcomes(&pending, outcomes)?
            }
        };

        let manifest = OutputManifest::assemble(output_dir, existing, slices);
        if !manifest.undefined_reference.is_empty() {
            tracing::warn!(
                count = manifest.undefined_reference.len(),
                "Slices normalized against an empty reference population"
            );
        }

        Ok(manifest)
    }
}

fn collect_outcomes(
    pairs: &[(&Path, &Path)],
    outcomes: Vec<Result<NormalizedSlice>>,
) -> Result<Vec<NormalizedSlice>> {
    let mut report = FailureReport::default();
    for (&(target, reference), outcome) in pairs.iter().zip(outcomes) {
        match outcome {
            Ok(slice) => report.written.push(slice),
            Err(error) => {
                tracing::error!(slice = %target.display(), %error, "Slice failed");
                report.failures.push(SliceFailure {
                    target: target.to_path_buf(),
                    reference: reference.to_path_buf(),
                    error,
                });
            }
        }
    }

    if report.failures.is_empty() {
        Ok(report.written)
    } else {
        Err(Error::Incomplete { report })
    }
}

//! Whole-run scenarios on synthetic stacks written through the real codec.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::CancelToken;

use super::*;
use crate::image::{self, FileCodec, GrayImage, ImageCodec, ImageDimensions, SampleType};

/// File codec that counts how often it is asked to read and write.
#[derive(Default)]
struct CountingCodec {
    decodes: AtomicUsize,
    encodes: AtomicUsize,
}

impl ImageCodec for CountingCodec {
    fn decode(&self, path: &Path) -> image::Result<GrayImage> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        FileCodec.decode(path)
    }

    fn encode(&self, image: &GrayImage, path: &Path) -> image::Result<()> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        FileCodec.encode(image, path)
    }
}

fn write_stack(dir: &Path, prefix: &str, slices: &[Vec<f32>]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    slices
        .iter()
        .enumerate()
        .map(|(i, values)| {
            let path = dir.join(format!("{}_{:03}.tif", prefix, i + 1));
            let image =
                GrayImage::new(ImageDimensions::new(2, 2), SampleType::U16, values.clone())
                    .unwrap();
            FileCodec.encode(&image, &path).unwrap();
            path
        })
        .collect()
}

struct Fixture {
    root: tempfile::TempDir,
    targets: Vec<PathBuf>,
    references: Vec<PathBuf>,
}

impl Fixture {
    /// Three 2x2 slices: targets are flat 200, reference slice z is flat 100·z.
    fn flat() -> Self {
        let root = tempfile::tempdir().unwrap();
        let targets = write_stack(&root.path().join("soi"), "soi", &vec![vec![200.0; 4]; 3]);
        let references = write_stack(
            &root.path().join("dapi"),
            "dapi",
            &[vec![100.0; 4], vec![200.0; 4], vec![300.0; 4]],
        );
        Self {
            root,
            targets,
            references,
        }
    }

    fn default_output_dir(&self) -> PathBuf {
        self.root.path().join("soi_n_dapi")
    }
}

fn sequential() -> NormalizationConfig {
    NormalizationConfig {
        parallel: false,
        ..Default::default()
    }
}

fn read(path: &Path) -> Vec<f32> {
    FileCodec.decode(path).unwrap().into_pixels()
}

#[test]
fn normalizes_each_slice_by_its_reference_mean() {
    common::log_setup::init_test_logging();
    let fx = Fixture::flat();

    let manifest = normalize_stack(&fx.targets, &fx.references, &sequential()).unwrap();

    assert_eq!(manifest.reused, 0);
    assert_eq!(manifest.output_dir, fx.default_output_dir());
    let names: Vec<_> = manifest
        .paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "soi_n_dapi_mean_1.tiff",
            "soi_n_dapi_mean_2.tiff",
            "soi_n_dapi_mean_3.tiff"
        ]
    );
    assert_eq!(read(&manifest.paths[0]), vec![2.0; 4]);
    assert_eq!(read(&manifest.paths[1]), vec![1.0; 4]);
    // 200 / 300 truncates to 0.
    assert_eq!(read(&manifest.paths[2]), vec![0.0; 4]);
    assert!(manifest.undefined_reference.is_empty());
}

#[test]
fn existing_output_is_reused_without_normalizing() {
    let fx = Fixture::flat();
    let first = normalize_stack(&fx.targets, &fx.references, &sequential()).unwrap();

    let codec = CountingCodec::default();
    let config = sequential();
    let second = StackNormalizer::new(&config)
        .with_codec(&codec)
        .run(&fx.targets, &fx.references)
        .unwrap();

    assert!(second.is_fully_reused());
    assert_eq!(second.reused, 3);
    assert_eq!(second.paths, first.paths);
    assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
    assert_eq!(codec.encodes.load(Ordering::SeqCst), 0);
}

#[test]
fn regenerate_recomputes_existing_output() {
    let fx = Fixture::flat();
    normalize_stack(&fx.targets, &fx.references, &sequential()).unwrap();

    let codec = CountingCodec::default();
    let config = NormalizationConfig {
        regenerate: true,
        ..sequential()
    };
    let manifest = StackNormalizer::new(&config)
        .with_codec(&codec)
        .run(&fx.targets, &fx.references)
        .unwrap();

    assert_eq!(manifest.reused, 0);
    assert_eq!(manifest.len(), 3);
    assert_eq!(codec.encodes.load(Ordering::SeqCst), 3);
}

#[test]
fn unequal_stacks_fail_before_touching_the_filesystem() {
    let fx = Fixture::flat();

    let err = normalize_stack(&fx.targets, &fx.references[..2], &sequential()).unwrap_err();

    assert!(matches!(
        err,
        Error::CountMismatch {
            targets: 3,
            references: 2
        }
    ));
    assert!(!fx.default_output_dir().exists());
}

#[test]
fn empty_stack_is_rejected() {
    let err = normalize_stack(&[], &[], &sequential()).unwrap_err();
    assert!(matches!(err, Error::EmptyStack));
}

#[test]
fn input_order_does_not_matter() {
    let fx = Fixture::flat();
    let mut targets = fx.targets.clone();
    targets.reverse();

    let manifest = normalize_stack(&targets, &fx.references, &sequential()).unwrap();

    assert_eq!(read(&manifest.paths[0]), vec![2.0; 4]);
}

#[test]
fn misnumbered_reference_stops_the_run() {
    let root = tempfile::tempdir().unwrap();
    let targets = write_stack(&root.path().join("soi"), "soi", &vec![vec![1.0; 4]; 2]);
    let mut references = write_stack(&root.path().join("dapi"), "dapi", &vec![vec![1.0; 4]; 2]);
    let renamed = root.path().join("dapi").join("dapi_003.tif");
    std::fs::rename(&references[1], &renamed).unwrap();
    references[1] = renamed;

    let err = normalize_stack(&targets, &references, &sequential()).unwrap_err();

    assert!(matches!(
        err,
        Error::ZIndexMismatch {
            target: 2,
            reference: 3
        }
    ));
}

#[test]
fn continue_policy_reports_every_failure() {
    let fx = Fixture::flat();
    std::fs::write(&fx.references[1], b"not a tiff").unwrap();
    let config = NormalizationConfig {
        failure_policy: FailurePolicy::Continue,
        ..sequential()
    };

    let err = normalize_stack(&fx.targets, &fx.references, &config).unwrap_err();

    let Error::Incomplete { report } = err else {
        panic!("expected an incomplete run");
    };
    assert_eq!(report.total(), 3);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reference, fx.references[1]);
    assert!(matches!(report.failures[0].error, Error::Decode { .. }));
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let fx = Fixture::flat();
    let sequential_dir = fx.root.path().join("seq");
    let parallel_dir = fx.root.path().join("par");

    let seq = normalize_stack(
        &fx.targets,
        &fx.references,
        &NormalizationConfig {
            output_dir: Some(sequential_dir),
            ..sequential()
        },
    )
    .unwrap();
    let par = normalize_stack(
        &fx.targets,
        &fx.references,
        &NormalizationConfig {
            output_dir: Some(parallel_dir),
            parallel: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(seq.len(), par.len());
    for (a, b) in seq.paths.iter().zip(&par.paths) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(read(a), read(b));
    }
}

#[test]
fn progress_is_reported_per_stage() {
    let fx = Fixture::flat();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let progress: ProgressCallback = common::SharedFn::new(Arc::new(
        move |p: NormalizationProgress| {
            sink.lock().unwrap().push((p.stage, p.current, p.total));
        },
    ));
    let config = NormalizationConfig {
        mask_from_reference: true,
        ..sequential()
    };

    StackNormalizer::new(&config)
        .with_progress(progress)
        .run(&fx.targets, &fx.references)
        .unwrap();

    let events = events.lock().unwrap();
    let mask: Vec<_> = events
        .iter()
        .filter(|e| e.0 == NormalizationStage::BuildingMask)
        .map(|e| e.1)
        .collect();
    let norm: Vec<_> = events
        .iter()
        .filter(|e| e.0 == NormalizationStage::Normalizing)
        .map(|e| e.1)
        .collect();
    assert_eq!(mask, vec![1, 2, 3]);
    assert_eq!(norm, vec![1, 2, 3]);
    assert!(events.iter().all(|e| e.2 == 3));
}

#[test]
fn cancellation_stops_between_slices() {
    let fx = Fixture::flat();
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let progress: ProgressCallback = common::SharedFn::new(Arc::new(
        move |p: NormalizationProgress| {
            if p.current == 1 {
                trigger.cancel();
            }
        },
    ));
    let config = sequential();

    let err = StackNormalizer::new(&config)
        .with_progress(progress)
        .with_cancel(cancel)
        .run(&fx.targets, &fx.references)
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { completed: 1 }));
    let written = common::file_utils::image_files(&fx.default_output_dir()).unwrap();
    assert_eq!(written.len(), 1);
}

#[test]
fn rerun_after_cancellation_completes_missing_slices() {
    let fx = Fixture::flat();
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let progress: ProgressCallback = common::SharedFn::new(Arc::new(
        move |p: NormalizationProgress| {
            if p.current == 1 {
                trigger.cancel();
            }
        },
    ));
    let config = sequential();
    StackNormalizer::new(&config)
        .with_progress(progress)
        .with_cancel(cancel)
        .run(&fx.targets, &fx.references)
        .unwrap_err();

    let codec = CountingCodec::default();
    let manifest = StackNormalizer::new(&config)
        .with_codec(&codec)
        .run(&fx.targets, &fx.references)
        .unwrap();

    assert_eq!(manifest.len(), 3);
    assert_eq!(manifest.reused, 1);
    assert!(!manifest.is_fully_reused());
    let out = fx.default_output_dir();
    assert_eq!(
        manifest.paths,
        vec![
            out.join("soi_n_dapi_mean_1.tiff"),
            out.join("soi_n_dapi_mean_2.tiff"),
            out.join("soi_n_dapi_mean_3.tiff"),
        ]
    );
    // Only the two missing pairs are decoded and written.
    assert_eq!(codec.decodes.load(Ordering::SeqCst), 4);
    assert_eq!(codec.encodes.load(Ordering::SeqCst), 2);
    assert_eq!(read(&manifest.paths[1]), vec![1.0; 4]);
}

#[test]
fn unrelated_files_in_output_dir_are_not_listed() {
    let fx = Fixture::flat();
    let first = normalize_stack(&fx.targets, &fx.references, &sequential()).unwrap();
    let stray = fx.default_output_dir().join("preview.png");
    std::fs::write(&stray, b"").unwrap();

    let second = normalize_stack(&fx.targets, &fx.references, &sequential()).unwrap();

    assert_eq!(second.paths, first.paths);
    assert!(!second.paths.contains(&stray));
}

#[test]
fn reference_mask_excludes_sparse_pixels() {
    let root = tempfile::tempdir().unwrap();
    let targets = write_stack(&root.path().join("soi"), "soi", &vec![vec![200.0; 4]; 3]);
    // Pixel 3 is lit in only one of three reference slices.
    let references = write_stack(
        &root.path().join("dapi"),
        "dapi",
        &[
            vec![100.0, 100.0, 100.0, 0.0],
            vec![100.0, 100.0, 100.0, 0.0],
            vec![100.0, 100.0, 100.0, 400.0],
        ],
    );

    let masked = normalize_stack(
        &targets,
        &references,
        &NormalizationConfig {
            mask_from_reference: true,
            ..sequential()
        },
    )
    .unwrap();
    let unmasked = normalize_stack(&targets, &references, &sequential()).unwrap();

    assert_eq!(masked.output_dir, root.path().join("soi_n_im_dapi"));
    assert_eq!(read(&masked.paths[2]), vec![2.0; 4]);
    // Unmasked mean is (300 + 400) / 4 = 175.
    assert_eq!(read(&unmasked.paths[2]), vec![1.0; 4]);
}

#[test]
fn empty_reference_slices_are_flagged_in_manifest() {
    let root = tempfile::tempdir().unwrap();
    let targets = write_stack(&root.path().join("soi"), "soi", &vec![vec![50.0; 4]; 2]);
    let references = write_stack(
        &root.path().join("dapi"),
        "dapi",
        &[vec![10.0; 4], vec![0.0; 4]],
    );

    let manifest = normalize_stack(&targets, &references, &sequential()).unwrap();

    assert_eq!(manifest.undefined_reference, vec![manifest.paths[1].clone()]);
    assert_eq!(read(&manifest.paths[0]), vec![5.0; 4]);
    assert_eq!(read(&manifest.paths[1]), vec![0.0; 4]);
}

#[test]
fn undecodable_reference_aborts_mask_building() {
    let fx = Fixture::flat();
    std::fs::write(&fx.references[0], b"garbage").unwrap();
    let config = NormalizationConfig {
        mask_from_reference: true,
        ..sequential()
    };

    let err = normalize_stack(&fx.targets, &fx.references, &config).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

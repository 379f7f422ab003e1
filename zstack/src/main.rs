use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use common::file_utils::image_files;
use common::SharedFn;
use zstack::normalization::ThresholdCoverage;
use zstack::{
    build_mask_from_paths, detect_sharp_changes_in_series, reference_mean_series, slices_below_threshold,
    Direction, FailurePolicy, FileCodec, FilterPolicy, NormalizationConfig, NormalizationProgress,
    NormalizationStage, ProgressCallback, StackNormalizer,
};

#[derive(Parser, Debug)]
#[command(name = "zstack", version, about = "Normalize a Z-stack against a reference stack")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Divide each target slice by the mean of its reference slice.
    Normalize(NormalizeArgs),
    /// Report sharp changes in the per-slice reference mean.
    Changes(ChangesArgs),
    /// Count slices with no pixel at or above a threshold.
    Coverage(CoverageArgs),
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    target_dir: PathBuf,
    reference_dir: PathBuf,
    /// YAML or JSON file with a NormalizationConfig; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    threshold: Option<f32>,
    #[arg(long)]
    upper_bound: Option<f32>,
    /// Outlier rejection in standard deviations; a negative value disables it.
    #[arg(long, allow_negative_numbers = true)]
    outlier_std_devs: Option<f32>,
    #[arg(long)]
    raw: bool,
    #[arg(long)]
    mask: bool,
    #[arg(long)]
    mask_cutoff: Option<f32>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    regenerate: bool,
    #[arg(long)]
    z_digits: Option<usize>,
    /// Process slices one at a time.
    #[arg(long)]
    sequential: bool,
    /// Keep going past failing slices and report them all at the end.
    #[arg(long)]
    keep_going: bool,
}

#[derive(Args, Debug)]
struct ChangesArgs {
    reference_dir: PathBuf,
    /// Jump size to flag. Defaults to the standard deviation of the differences.
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long, default_value = "both")]
    direction: Direction,
    /// Lower bound applied to reference pixels before averaging.
    #[arg(long, default_value_t = 0.0)]
    lower_bound: f32,
    #[arg(long)]
    mask: bool,
    #[arg(long, default_value_t = zstack::normalization::DEFAULT_MASK_CUTOFF)]
    mask_cutoff: f32,
}

#[derive(Args, Debug)]
struct CoverageArgs {
    dir: PathBuf,
    #[arg(long)]
    threshold: f32,
    /// Source stack the directory was normalized from, to compare slice counts.
    #[arg(long)]
    source_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    common::log_setup::setup_logging(&cli.log_level);

    match cli.command {
        Command::Normalize(args) => normalize(args),
        Command::Changes(args) => changes(args),
        Command::Coverage(args) => coverage(args),
    }
}

fn list_stack(dir: &Path) -> Result<Vec<PathBuf>> {
    let paths =
        image_files(dir).with_context(|| format!("Failed to list slices in {}", dir.display()))?;
    if paths.is_empty() {
        bail!("No image files found in {}", dir.display());
    }
    Ok(paths)
}

fn build_config(args: &NormalizeArgs) -> Result<NormalizationConfig> {
    let mut config = match &args.config {
        Some(path) => NormalizationConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NormalizationConfig::default(),
    };

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.upper_bound.is_some() {
        config.upper_bound = args.upper_bound;
    }
    if let Some(std_devs) = args.outlier_std_devs {
        config.set_outlier_std_devs(std_devs);
    }
    if let Some(cutoff) = args.mask_cutoff {
        config.mask_cutoff = cutoff;
    }
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir.clone();
    }
    if args.z_digits.is_some() {
        config.z_index_digits = args.z_digits;
    }
    config.raw_normalization |= args.raw;
    config.mask_from_reference |= args.mask;
    config.regenerate |= args.regenerate;
    if args.sequential {
        config.parallel = false;
    }
    if args.keep_going {
        config.failure_policy = FailurePolicy::Continue;
    }

    config.validate()?;
    Ok(config)
}

fn console_progress() -> ProgressCallback {
    SharedFn::new(Arc::new(|p: NormalizationProgress| {
        let label = match p.stage {
            NormalizationStage::BuildingMask => "Building mask",
            NormalizationStage::Normalizing => "Normalizing",
        };
        eprint!(
            "\r{} ({}/{}, {:.0}%)...",
            label,
            p.current,
            p.total,
            p.fraction() * 100.0
        );
        if p.is_complete() {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    }))
}

fn normalize(args: NormalizeArgs) -> Result<()> {
    let config = build_config(&args)?;
    let targets = list_stack(&args.target_dir)?;
    let references = list_stack(&args.reference_dir)?;

    let manifest = StackNormalizer::new(&config)
        .with_progress(console_progress())
        .run(&targets, &references)?;

    if manifest.is_fully_reused() {
        tracing::info!(
            dir = %manifest.output_dir.display(),
            slices = manifest.len(),
            "Reused existing output; pass --regenerate to recompute"
        );
    } else {
        tracing::info!(
            dir = %manifest.output_dir.display(),
            slices = manifest.len(),
            reused = manifest.reused,
            undefined = manifest.undefined_reference.len(),
            "Normalization finished"
        );
    }
    for path in &manifest.undefined_reference {
        tracing::warn!(path = %path.display(), "Reference statistic undefined");
    }

    Ok(())
}

fn changes(args: ChangesArgs) -> Result<()> {
    let references = list_stack(&args.reference_dir)?;
    let mask = if args.mask {
        Some(build_mask_from_paths(
            &FileCodec,
            &references,
            args.mask_cutoff,
            &ProgressCallback::default(),
        )?)
    } else {
        None
    };
    let policy = FilterPolicy {
        lower_bound: args.lower_bound,
        ..Default::default()
    };

    let series = reference_mean_series(&FileCodec, &references, &policy, mask.as_ref())?;
    for (path, _) in references.iter().zip(&series).filter(|(_, m)| m.is_none()) {
        tracing::warn!(path = %path.display(), "No valid reference pixels, slice skipped");
    }
    let flagged = detect_sharp_changes_in_series(&series, args.threshold, args.direction);

    tracing::info!(slices = series.len(), changes = flagged.len(), direction = %args.direction, "Change detection finished");
    for change in flagged {
        let (from, to) = (change.from, change.to);
        println!(
            "{}\t{} -> {}\t{:.3} -> {:.3}",
            from,
            references[from].display(),
            references[to].display(),
            series[from].unwrap_or(f64::NAN),
            series[to].unwrap_or(f64::NAN)
        );
    }

    Ok(())
}

fn coverage(args: CoverageArgs) -> Result<()> {
    let slices = list_stack(&args.dir)?;
    let below = slices_below_threshold(&FileCodec, &slices, args.threshold)?;
    let source_count = match &args.source_dir {
        Some(dir) => list_stack(dir)?.len(),
        None => slices.len(),
    };
    let coverage = ThresholdCoverage::new(below.len(), slices.len(), source_count);

    for path in &below {
        println!("{}", path.display());
    }
    println!("slices below threshold: {}", coverage.below);
    println!("slices in stack: {}", coverage.total);
    if !coverage.stacks_match {
        println!("normalized and source stacks differ in slice count ({})", source_count);
    } else if coverage.all_below() {
        println!("all slices are below threshold");
    } else {
        println!("slices above threshold: {:.1}%", coverage.percent_above());
    }

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use dwiflow_core::consts::{DEFAULT_MIN_STREAMLINE_LENGTH_MM, DEFAULT_STREAMLINE_COUNT};
use dwiflow_core::pipeline::config::{
    DistortionMode, PipelineConfig, SegmentationConfig, TractographyConfig,
};
use dwiflow_core::pipeline::{run_pipeline_reported, ProgressReporter, RunOutcome, StageKind};
use dwiflow_core::tool::SystemRunner;
use indicatif::{ProgressBar, ProgressStyle};

use crate::summary::{print_pipeline_summary, print_run_report};

#[derive(Clone, Copy, ValueEnum)]
pub enum RpeArg {
    Auto,
    None,
    Pair,
    All,
}

impl From<RpeArg> for DistortionMode {
    fn from(arg: RpeArg) -> Self {
        match arg {
            RpeArg::Auto => DistortionMode::Auto,
            RpeArg::None => DistortionMode::None,
            RpeArg::Pair => DistortionMode::Pair,
            RpeArg::All => DistortionMode::All,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// BIDS dataset root
    pub bids_root: PathBuf,

    /// Subject identifier (with or without `sub-`)
    pub subject: String,

    /// Session identifier (with or without `ses-`)
    pub session: String,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Restricted field-of-view acquisition (e.g. optic nerve)
    #[arg(long)]
    pub partial_brain: bool,

    /// Motion/distortion correction mode
    #[arg(long, value_enum, default_value = "auto")]
    pub rpe: RpeArg,

    /// Replace the results of a previous run
    #[arg(long)]
    pub overwrite: bool,

    /// Working directory for the external tools
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Streamlines selected by partial-brain tractography
    #[arg(long, default_value_t = DEFAULT_STREAMLINE_COUNT)]
    pub streamlines: u64,

    /// Minimum streamline length in mm
    #[arg(long, default_value_t = DEFAULT_MIN_STREAMLINE_LENGTH_MM)]
    pub min_length: f32,

    /// Skip tract segmentation
    #[arg(long)]
    pub no_segmentation: bool,
}

/// Upper bound on the stages of one run.
const STAGE_COUNT: u64 = 9;

/// Drives a progress bar with one tick per pipeline stage.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: StageKind) {
        self.bar.set_message(stage.to_string());
    }

    fn finish_stage(&self, _stage: StageKind) {
        self.bar.inc(1);
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        build_config_from_args(args)
    };

    print_pipeline_summary(&config);

    let runner = match config.working_dir {
        Some(ref dir) => SystemRunner::with_working_dir(dir),
        None => SystemRunner::new(),
    };

    let bar = ProgressBar::new(STAGE_COUNT);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:26} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = Arc::new(BarReporter { bar: bar.clone() });

    let report = run_pipeline_reported(&config, &runner, reporter);
    bar.finish_and_clear();

    print_run_report(&report);
    // The report already printed the diagnostic.
    if let RunOutcome::Failed { stage, .. } = report.outcome {
        bail!("pipeline stopped at {stage}");
    }
    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> PipelineConfig {
    PipelineConfig {
        partial_brain: args.partial_brain,
        distortion_correction: args.rpe.into(),
        overwrite: args.overwrite,
        working_dir: args.working_dir.clone(),
        tractography: TractographyConfig {
            streamlines: args.streamlines,
            min_length_mm: args.min_length,
        },
        segmentation: SegmentationConfig {
            enabled: !args.no_segmentation,
        },
        ..PipelineConfig::new(&args.bids_root, &args.subject, &args.session)
    }
}

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::context::Diagnostics;
use crate::error::{DwiflowError, Result};
use crate::shell::ShellKind;

/// Pipeline stage, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StageKind {
    Selection,
    FormatAdaptation,
    ShellClassification,
    Preprocessing,
    Fod,
    StructuralCoregistration,
    AuxiliaryCoregistration,
    Segmentation,
    Consolidation,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection => write!(f, "Selecting sequences"),
            Self::FormatAdaptation => write!(f, "Converting inputs"),
            Self::ShellClassification => write!(f, "Classifying shells"),
            Self::Preprocessing => write!(f, "Preprocessing DWI"),
            Self::Fod => write!(f, "Estimating FOD"),
            Self::StructuralCoregistration => write!(f, "Coregistering anatomy"),
            Self::AuxiliaryCoregistration => write!(f, "Coregistering auxiliary"),
            Self::Segmentation => write!(f, "Segmenting tracts"),
            Self::Consolidation => write!(f, "Consolidating results"),
        }
    }
}

/// Motion/distortion correction policy, resolved for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RpeMode {
    /// No reversed-phase data: phase-encode direction and readout time only.
    None,
    /// Reversed-phase b0 pair built from the pepolar sequence.
    Pair,
    /// Every volume already carries reversed-phase information. The built-in
    /// correction is skipped in this mode.
    All,
}

impl fmt::Display for RpeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Pair => write!(f, "pair"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Key artifacts of a successful run, as consolidated in the results
/// directory.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineOutput {
    pub results_dir: PathBuf,
    pub shell: ShellKind,
    pub preprocessed_dwi: PathBuf,
    pub brain_mask: PathBuf,
    pub wm_fod: PathBuf,
    pub peaks: PathBuf,
    pub tractogram: Option<PathBuf>,
    pub anatomical: Option<PathBuf>,
    pub auxiliary: Option<PathBuf>,
    pub segmentation_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(PipelineOutput),
    /// The run stopped at the first failure.
    Failed {
        stage: StageKind,
        error: DwiflowError,
    },
}

/// Result of one subject/session run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Stages entered, in order.
    pub stages: Vec<StageKind>,
    pub diagnostics: Diagnostics,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }

    pub fn into_result(self) -> Result<PipelineOutput> {
        match self.outcome {
            RunOutcome::Completed(output) => Ok(output),
            RunOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started.
    fn begin_stage(&self, _stage: StageKind) {}

    /// The current stage is finished.
    fn finish_stage(&self, _stage: StageKind) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

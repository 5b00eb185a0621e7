use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::error::{DwiflowError, Result};
use crate::layout::SessionLayout;
use crate::pipeline::StageKind;
use crate::tool::{ToolInvocation, ToolOutput, ToolRunner};

/// Named slots of the per-run artifact accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKey {
    Dwi,
    Anatomical,
    Auxiliary,
    Pepolar,
    ReferencePair,
    PreprocessedDwi,
    BrainMask,
    WhiteMatterFod,
    Peaks,
    PeaksNifti,
    Tractogram,
    CoregisteredAnatomical,
    Transform,
    TissueSegmentation,
    GmWmSeed,
    CoregisteredAuxiliary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub stage: StageKind,
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Per-run diagnostics sink.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    records: Vec<DiagnosticRecord>,
}

impl Diagnostics {
    pub fn push(&mut self, stage: StageKind, level: DiagnosticLevel, message: impl Into<String>) {
        self.records.push(DiagnosticRecord {
            stage,
            level,
            message: message.into(),
        });
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn with_level(&self, level: DiagnosticLevel) -> impl Iterator<Item = &DiagnosticRecord> {
        self.records.iter().filter(move |r| r.level == level)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Mutable state of one subject/session execution: the tool runner, the
/// directory layout, the artifacts produced so far and the diagnostics sink.
/// Dropped at the end of the run whatever the outcome.
pub struct PipelineContext<'a> {
    runner: &'a dyn ToolRunner,
    layout: SessionLayout,
    stage: StageKind,
    trail: Vec<StageKind>,
    artifacts: BTreeMap<ArtifactKey, Artifact>,
    diagnostics: Diagnostics,
}

impl<'a> PipelineContext<'a> {
    pub fn new(runner: &'a dyn ToolRunner, layout: SessionLayout) -> Self {
        Self {
            runner,
            layout,
            stage: StageKind::Selection,
            trail: Vec::new(),
            artifacts: BTreeMap::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Stage currently executing.
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Stages entered so far, in order.
    pub fn trail(&self) -> &[StageKind] {
        &self.trail
    }

    pub fn enter(&mut self, stage: StageKind) {
        info!("----- {stage} -----");
        self.stage = stage;
        self.trail.push(stage);
    }

    pub fn insert(&mut self, key: ArtifactKey, artifact: Artifact) {
        debug!(?key, artifact = %artifact.id, "Artifact registered");
        self.artifacts.insert(key, artifact);
    }

    pub fn get(&self, key: ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(&key)
    }

    /// Artifact a later stage depends on.
    pub fn require(&self, key: ArtifactKey) -> Result<Artifact> {
        self.artifacts
            .get(&key)
            .cloned()
            .ok_or_else(|| DwiflowError::Pipeline(format!("missing {key:?} artifact")))
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(stage = %self.stage, "{message}");
        self.diagnostics
            .push(self.stage, DiagnosticLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(stage = %self.stage, "{message}");
        self.diagnostics
            .push(self.stage, DiagnosticLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(self.stage, DiagnosticLevel::Error, message);
    }

    /// Run an external command and apply the tool contract: exit status 0
    /// and every declared output present, otherwise a failure carrying the
    /// captured output.
    pub fn run(&mut self, invocation: ToolInvocation) -> Result<ToolOutput> {
        debug!(stage = %self.stage, command = %invocation, "Launching");
        let output = self
            .runner
            .run(&invocation)
            .map_err(|source| DwiflowError::ToolLaunch {
                tool: invocation.program.clone(),
                source,
            })?;

        if !output.is_success() {
            return Err(DwiflowError::ToolFailure {
                tool: invocation.program,
                code: output.code,
                diagnostic: output.diagnostic(),
            });
        }
        if let Some(missing) = invocation.outputs.iter().find(|p| !p.exists()) {
            return Err(DwiflowError::MissingOutput {
                tool: invocation.program.clone(),
                path: missing.clone(),
            });
        }
        Ok(output)
    }

    pub fn into_parts(self) -> (Vec<StageKind>, Diagnostics) {
        (self.trail, self.diagnostics)
    }
}

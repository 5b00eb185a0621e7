use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::artifact::Artifact;
use crate::context::{ArtifactKey, PipelineContext};
use crate::error::Result;
use crate::layout::SessionLayout;
use crate::selector::select_sequences;
use crate::sequence::discover_session;
use crate::shell::classify_shells;
use crate::tool::ToolRunner;

use super::config::PipelineConfig;
use super::convert::adapt_sequences;
use super::coreg::{run_auxiliary_coregistration, run_structural_coregistration};
use super::fod::{run_fod, FodInputs};
use super::preprocess::{run_preprocessing, PreprocessInputs};
use super::segmentation::run_segmentation;
use super::types::{
    NoOpReporter, PipelineOutput, ProgressReporter, RunOutcome, RunReport, StageKind,
};

/// Enter `kind`, run `body`, and report the stage boundaries.
fn stage<'a, T>(
    ctx: &mut PipelineContext<'a>,
    reporter: &dyn ProgressReporter,
    kind: StageKind,
    body: impl FnOnce(&mut PipelineContext<'a>) -> Result<T>,
) -> Result<T> {
    ctx.enter(kind);
    reporter.begin_stage(kind);
    let result = body(ctx);
    reporter.finish_stage(kind);
    result
}

fn consolidate(artifact: &Artifact, results_dir: &Path) -> Result<PathBuf> {
    let destination = results_dir.join(artifact.id.file_name());
    std::fs::copy(artifact.path(), &destination)?;
    Ok(destination)
}

fn execute(
    config: &PipelineConfig,
    ctx: &mut PipelineContext<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<PipelineOutput> {
    let (selection, mode) = stage(ctx, reporter, StageKind::Selection, |ctx| {
        config.validate()?;
        let sequences = discover_session(&ctx.layout().session_dir())?;
        let selection = select_sequences(&sequences)?;
        if selection.flair_promoted() {
            ctx.info("FLAIR used as anatomical reference, auxiliary coregistration disabled");
        }
        let mode = config
            .distortion_correction
            .resolve(selection.pepolar.is_some())?;
        ctx.info(format!("Motion/distortion correction mode: {mode}"));
        Ok((selection, mode))
    })?;

    let inputs = stage(ctx, reporter, StageKind::FormatAdaptation, |ctx| {
        ctx.layout().prepare(config.overwrite)?;
        let inputs = adapt_sequences(ctx, &selection, mode)?;
        ctx.insert(ArtifactKey::Dwi, inputs.dwi.clone());
        if let Some(ref anatomical) = inputs.anatomical {
            ctx.insert(ArtifactKey::Anatomical, anatomical.clone());
        }
        if let Some(ref auxiliary) = inputs.auxiliary {
            ctx.insert(ArtifactKey::Auxiliary, auxiliary.clone());
        }
        if let Some(ref pepolar) = inputs.pepolar {
            ctx.insert(ArtifactKey::Pepolar, pepolar.artifact.clone());
        }
        Ok(inputs)
    })?;

    let shell = stage(ctx, reporter, StageKind::ShellClassification, |ctx| {
        let dwi = ctx.require(ArtifactKey::Dwi)?;
        classify_shells(ctx, &dwi)
    })?;

    stage(ctx, reporter, StageKind::Preprocessing, |ctx| {
        let dwi = ctx.require(ArtifactKey::Dwi)?;
        let output = run_preprocessing(
            ctx,
            PreprocessInputs {
                dwi: &dwi,
                params: &inputs.params,
                shell,
                mode,
                pepolar: inputs.pepolar.as_ref(),
                partial_brain: config.partial_brain,
            },
        )?;
        if let Some(pair) = output.reference_pair {
            ctx.insert(ArtifactKey::ReferencePair, pair);
        }
        ctx.insert(ArtifactKey::PreprocessedDwi, output.dwi);
        ctx.insert(ArtifactKey::BrainMask, output.mask);
        Ok(())
    })?;

    stage(ctx, reporter, StageKind::Fod, |ctx| {
        let dwi = ctx.require(ArtifactKey::PreprocessedDwi)?;
        let mask = ctx.require(ArtifactKey::BrainMask)?;
        let output = run_fod(
            ctx,
            FodInputs {
                dwi: &dwi,
                mask: &mask,
                shell,
                partial_brain: config.partial_brain,
                tractography: &config.tractography,
            },
        )?;
        ctx.insert(ArtifactKey::WhiteMatterFod, output.wm_fod);
        ctx.insert(ArtifactKey::Peaks, output.peaks);
        ctx.insert(ArtifactKey::PeaksNifti, output.peaks_nifti);
        if let Some(tractogram) = output.tractogram {
            ctx.insert(ArtifactKey::Tractogram, tractogram);
        }
        Ok(())
    })?;

    if ctx.get(ArtifactKey::Anatomical).is_some() {
        stage(ctx, reporter, StageKind::StructuralCoregistration, |ctx| {
            let anatomical = ctx.require(ArtifactKey::Anatomical)?;
            let dwi = ctx.require(ArtifactKey::PreprocessedDwi)?;
            let output = run_structural_coregistration(ctx, &anatomical, &dwi)?;
            ctx.insert(ArtifactKey::CoregisteredAnatomical, output.anatomical);
            ctx.insert(ArtifactKey::Transform, output.transform);
            ctx.insert(ArtifactKey::TissueSegmentation, output.tissue);
            ctx.insert(ArtifactKey::GmWmSeed, output.seed);
            Ok(())
        })?;

        if ctx.get(ArtifactKey::Auxiliary).is_some() {
            // Advisory: a failure here is recorded and the run continues.
            let advisory = stage(ctx, reporter, StageKind::AuxiliaryCoregistration, |ctx| {
                let sequence = ctx.require(ArtifactKey::Auxiliary)?;
                let anatomical = ctx.require(ArtifactKey::Anatomical)?;
                let transform = ctx.require(ArtifactKey::Transform)?;
                run_auxiliary_coregistration(ctx, &sequence, &anatomical, &transform)
            });
            match advisory {
                Ok(output) => ctx.insert(ArtifactKey::CoregisteredAuxiliary, output.sequence),
                Err(e) => ctx.warn(format!("Auxiliary coregistration failed: {}", e.diagnostic())),
            }
        }
    }

    let segmentation_dir = if config.segmentation.enabled {
        let output = stage(ctx, reporter, StageKind::Segmentation, |ctx| {
            let peaks = ctx.require(ArtifactKey::PeaksNifti)?;
            let dir = ctx.layout().segmentation_dir();
            run_segmentation(ctx, &peaks, &dir)
        })?;
        Some(output.output_dir)
    } else {
        None
    };

    stage(ctx, reporter, StageKind::Consolidation, |ctx| {
        let results_dir = ctx.layout().results_dir();
        let copy = |key: ArtifactKey| -> Result<Option<PathBuf>> {
            ctx.get(key)
                .map(|artifact| consolidate(artifact, &results_dir))
                .transpose()
        };
        let output = PipelineOutput {
            results_dir: results_dir.clone(),
            shell,
            preprocessed_dwi: consolidate(&ctx.require(ArtifactKey::PreprocessedDwi)?, &results_dir)?,
            brain_mask: ctx.require(ArtifactKey::BrainMask)?.path(),
            wm_fod: consolidate(&ctx.require(ArtifactKey::WhiteMatterFod)?, &results_dir)?,
            peaks: consolidate(&ctx.require(ArtifactKey::PeaksNifti)?, &results_dir)?,
            tractogram: copy(ArtifactKey::Tractogram)?,
            anatomical: copy(ArtifactKey::CoregisteredAnatomical)?,
            auxiliary: copy(ArtifactKey::CoregisteredAuxiliary)?,
            segmentation_dir,
        };
        ctx.info(format!("Results consolidated in {}", results_dir.display()));
        Ok(output)
    })
}

/// Run the full pipeline for one subject/session with a progress reporter.
///
/// Stages run strictly in order; the first failure stops the run and is
/// reported with the stage it happened in. Artifacts already written stay on
/// disk.
pub fn run_pipeline_reported(
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
    reporter: Arc<dyn ProgressReporter>,
) -> RunReport {
    let layout = SessionLayout::new(&config.bids_root, &config.subject, &config.session);
    info!(
        subject = layout.subject(),
        session = layout.session(),
        partial_brain = config.partial_brain,
        "Starting DWI pipeline"
    );
    let mut ctx = PipelineContext::new(runner, layout);

    let outcome = match execute(config, &mut ctx, reporter.as_ref()) {
        Ok(output) => {
            info!(results = %output.results_dir.display(), "Processing done");
            RunOutcome::Completed(output)
        }
        Err(e) => {
            let stage = ctx.stage();
            error!(%stage, "{e}");
            ctx.error(e.diagnostic());
            RunOutcome::Failed { stage, error: e }
        }
    };

    let (stages, diagnostics) = ctx.into_parts();
    RunReport {
        outcome,
        stages,
        diagnostics,
    }
}

/// Run the full pipeline without progress reporting.
pub fn run_pipeline(config: &PipelineConfig, runner: &dyn ToolRunner) -> RunReport {
    let reporter = Arc::new(NoOpReporter);
    run_pipeline_reported(config, runner, reporter)
}

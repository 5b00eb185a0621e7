use crate::artifact::{Artifact, OpTag};
use crate::consts::{
    PARTIAL_BRAIN_MASK_THRESHOLD, PARTIAL_BRAIN_MEDIAN_PASSES, REGRID_VOXEL_SIZE_MM,
};
use crate::context::PipelineContext;
use crate::error::{DwiflowError, Result};
use crate::shell::{query_shells, ShellKind};
use crate::sidecar::AcquisitionParams;
use crate::tool::ToolInvocation;

use super::types::RpeMode;

/// Reversed phase-encoding sequence, converted to MIF.
#[derive(Clone, Debug)]
pub struct PepolarInput {
    pub artifact: Artifact,
    /// The sequence carries a gradient table (a full reversed acquisition).
    pub has_gradients: bool,
}

pub struct PreprocessInputs<'i> {
    /// Raw DWI in MIF format.
    pub dwi: &'i Artifact,
    pub params: &'i AcquisitionParams,
    pub shell: ShellKind,
    pub mode: RpeMode,
    pub pepolar: Option<&'i PepolarInput>,
    pub partial_brain: bool,
}

#[derive(Clone, Debug)]
pub struct PreprocessOutput {
    pub dwi: Artifact,
    pub mask: Artifact,
    pub reference_pair: Option<Artifact>,
}

/// Denoise, unring, correct motion/distortion and bias, then estimate the
/// brain mask. The first failing step aborts the stage.
pub fn run_preprocessing(
    ctx: &mut PipelineContext<'_>,
    inputs: PreprocessInputs<'_>,
) -> Result<PreprocessOutput> {
    let stage = ctx.stage();
    let dwi = inputs.dwi;

    let denoised = dwi.derive(OpTag::Denoise, stage);
    ctx.run(
        ToolInvocation::new("dwidenoise")
            .arg(dwi.path())
            .output(&denoised.path()),
    )?;

    let unringed = denoised.derive(OpTag::Degibbs, stage);
    ctx.run(
        ToolInvocation::new("mrdegibbs")
            .arg(denoised.path())
            .output(&unringed.path()),
    )?;

    let reference_pair = match (inputs.mode, inputs.pepolar) {
        (RpeMode::Pair, Some(pepolar)) => Some(build_reference_pair(ctx, dwi, pepolar)?),
        (RpeMode::Pair, None) => {
            return Err(DwiflowError::Config(
                "pair distortion correction requires a pepolar sequence".into(),
            ))
        }
        _ => None,
    };

    let corrected = match inputs.mode {
        RpeMode::All => {
            // Forwards the denoised and unringed DWI, not the raw conversion.
            ctx.warn("Motion/distortion correction not done (rpe_all)");
            unringed
        }
        mode => {
            let corrected = unringed.derive(OpTag::FslPreproc, stage);
            ctx.run(fslpreproc_invocation(
                &unringed,
                &corrected,
                inputs.params,
                mode,
                reference_pair.as_ref(),
                inputs.shell,
            ))?;
            corrected
        }
    };

    let mut unbiased = corrected.derive(OpTag::Unbias, stage);
    ctx.run(
        ToolInvocation::new("dwibiascorrect")
            .arg("ants")
            .arg(corrected.path())
            .output(&unbiased.path()),
    )?;

    if inputs.partial_brain {
        let regridded = unbiased.derive(OpTag::Regrid, stage);
        ctx.run(
            ToolInvocation::new("mrgrid")
                .arg(unbiased.path())
                .arg("regrid")
                .arg("-vox")
                .arg(REGRID_VOXEL_SIZE_MM.to_string())
                .output(&regridded.path()),
        )?;
        unbiased = regridded;
    }

    let mask = if inputs.partial_brain {
        partial_brain_mask(ctx, &unbiased)?
    } else {
        let mask = unbiased.derive(OpTag::BrainMask, stage);
        ctx.run(
            ToolInvocation::new("dwi2mask")
                .arg(unbiased.path())
                .output(&mask.path()),
        )?;
        mask
    };

    ctx.info("Preprocessing DWI done");
    Ok(PreprocessOutput {
        dwi: unbiased,
        mask,
        reference_pair,
    })
}

/// Build the `dwifslpreproc` command for the given correction mode.
///
/// `RpeMode::All` yields the `-rpe_all` form although the pipeline does not
/// currently run it.
pub fn fslpreproc_invocation(
    input: &Artifact,
    output: &Artifact,
    params: &AcquisitionParams,
    mode: RpeMode,
    reference_pair: Option<&Artifact>,
    shell: ShellKind,
) -> ToolInvocation {
    let mut cmd = ToolInvocation::new("dwifslpreproc")
        .arg(input.path())
        .output(&output.path());
    cmd = match (mode, reference_pair) {
        (RpeMode::Pair, Some(pair)) => cmd.arg("-rpe_pair").arg("-se_epi").arg(pair.path()),
        (RpeMode::All, _) => cmd.arg("-rpe_all"),
        _ => cmd.arg("-rpe_none"),
    };
    cmd = cmd
        .arg("-pe_dir")
        .arg(&params.phase_encoding_direction)
        .arg("-readout_time")
        .arg(params.readout_time.to_string());
    // A single eddy option keeps its trailing space so the value is not read
    // as a separate flag.
    let eddy_options = match shell {
        ShellKind::Multi => "--slm=linear --data_is_shelled",
        ShellKind::Single => "--slm=linear ",
    };
    cmd.arg("-eddy_options").arg(eddy_options)
}

/// Mean b0 of the DWI concatenated with the mean of the pepolar b0 volumes.
fn build_reference_pair(
    ctx: &mut PipelineContext<'_>,
    dwi: &Artifact,
    pepolar: &PepolarInput,
) -> Result<Artifact> {
    let stage = ctx.stage();
    let mut reference = pepolar.artifact.clone();

    if pepolar.has_gradients {
        let profile = query_shells(ctx, &reference)?;
        if !profile.is_empty() {
            ctx.info("Pepolar sequence contains diffusion-weighted shells, extracting b0");
            let bzero = reference.derive(OpTag::Bzero, stage);
            ctx.run(
                ToolInvocation::new("dwiextract")
                    .arg(reference.path())
                    .output(&bzero.path())
                    .arg("-bzero"),
            )?;
            reference = bzero;
        }
    }

    let ndim = ctx.run(ToolInvocation::new("mrinfo").arg(reference.path()).arg("-ndim"))?;
    let ndim: u32 = ndim
        .stdout
        .trim()
        .parse()
        .map_err(|_| DwiflowError::Parse(format!("invalid dimension count `{}`", ndim.stdout.trim())))?;

    let reference_mean = reference.derive(OpTag::Mean, stage);
    if ndim == 4 {
        ctx.run(temporal_mean(&reference, &reference_mean))?;
    } else {
        std::fs::copy(reference.path(), reference_mean.path())?;
    }

    let dwi_b0 = dwi.derive(OpTag::Bzero, stage);
    ctx.run(
        ToolInvocation::new("dwiextract")
            .arg(dwi.path())
            .output(&dwi_b0.path())
            .arg("-bzero"),
    )?;
    let dwi_b0_mean = dwi_b0.derive(OpTag::Mean, stage);
    ctx.run(temporal_mean(&dwi_b0, &dwi_b0_mean))?;

    let pair = dwi_b0_mean.derive(OpTag::ReferencePair, stage);
    ctx.run(
        ToolInvocation::new("mrcat")
            .arg(dwi_b0_mean.path())
            .arg(reference_mean.path())
            .output(&pair.path()),
    )?;
    Ok(pair)
}

pub(super) fn temporal_mean(input: &Artifact, output: &Artifact) -> ToolInvocation {
    ToolInvocation::new("mrmath")
        .arg(input.path())
        .arg("mean")
        .output(&output.path())
        .arg("-axis")
        .arg("3")
}

/// Mean, absolute threshold and median filtering. Whole-brain mask
/// estimation fails on small structures such as the optic nerve.
fn partial_brain_mask(ctx: &mut PipelineContext<'_>, dwi: &Artifact) -> Result<Artifact> {
    let stage = ctx.stage();

    let mean = dwi.derive(OpTag::Mean, stage);
    ctx.run(temporal_mean(dwi, &mean))?;

    let thresholded = mean.derive(OpTag::Threshold, stage);
    ctx.run(
        ToolInvocation::new("mrthreshold")
            .arg(mean.path())
            .arg("-abs")
            .arg(PARTIAL_BRAIN_MASK_THRESHOLD.to_string())
            .output(&thresholded.path()),
    )?;

    let mut mask = thresholded;
    for _ in 0..PARTIAL_BRAIN_MEDIAN_PASSES {
        let filtered = mask.derive(OpTag::MedianFilter, stage);
        ctx.run(
            ToolInvocation::new("mrfilter")
                .arg(mask.path())
                .arg("median")
                .output(&filtered.path()),
        )?;
        mask = filtered;
    }
    Ok(mask)
}

use crate::artifact::{Artifact, ImageFormat, OpTag, Tissue};
use crate::context::PipelineContext;
use crate::error::Result;
use crate::shell::ShellKind;
use crate::tool::ToolInvocation;

use super::config::TractographyConfig;
use super::convert::mif_to_nifti;
use super::types::StageKind;

pub struct FodInputs<'i> {
    /// Preprocessed DWI.
    pub dwi: &'i Artifact,
    pub mask: &'i Artifact,
    pub shell: ShellKind,
    pub partial_brain: bool,
    pub tractography: &'i TractographyConfig,
}

#[derive(Clone, Debug)]
pub struct FodOutput {
    /// White-matter FOD, normalised for multi-shell data.
    pub wm_fod: Artifact,
    pub normalised: bool,
    pub peaks: Artifact,
    /// Peaks in NIfTI, the format consumed by segmentation.
    pub peaks_nifti: Artifact,
    /// Direct tractography of partial-brain data.
    pub tractogram: Option<Artifact>,
}

/// Estimate response functions and FODs, then extract peaks.
///
/// Multi-shell data goes through three-tissue estimation and joint
/// normalisation; single-shell data through single-tissue estimation only.
pub fn run_fod(ctx: &mut PipelineContext<'_>, inputs: FodInputs<'_>) -> Result<FodOutput> {
    let (wm_fod, normalised) = match inputs.shell {
        ShellKind::Multi => (multi_tissue_fod(ctx, inputs.dwi, inputs.mask)?, true),
        ShellKind::Single => (single_tissue_fod(ctx, inputs.dwi, inputs.mask)?, false),
    };

    let stage = ctx.stage();
    let peaks = wm_fod.derive(OpTag::Peaks, stage);
    ctx.run(
        ToolInvocation::new("sh2peaks")
            .arg(wm_fod.path())
            .output(&peaks.path()),
    )?;
    let peaks_nifti = mif_to_nifti(ctx, &peaks, &peaks.dir)?;

    let tractogram = if inputs.partial_brain {
        Some(direct_tractography(ctx, &wm_fod, inputs.mask, inputs.tractography)?)
    } else {
        None
    };

    ctx.info("FOD estimation done");
    Ok(FodOutput {
        wm_fod,
        normalised,
        peaks,
        peaks_nifti,
        tractogram,
    })
}

fn response(dwi: &Artifact, tissue: Tissue, stage: StageKind) -> Artifact {
    dwi.derive_as(OpTag::Response(tissue), ImageFormat::Text, stage)
}

fn multi_tissue_fod(ctx: &mut PipelineContext<'_>, dwi: &Artifact, mask: &Artifact) -> Result<Artifact> {
    let stage = ctx.stage();
    let responses = Tissue::ALL.map(|t| response(dwi, t, stage));
    let voxels = dwi.derive(OpTag::ResponseVoxels, stage);

    let mut cmd = ToolInvocation::new("dwi2response")
        .arg("dhollander")
        .arg(dwi.path());
    for r in &responses {
        cmd = cmd.output(&r.path());
    }
    ctx.run(cmd.arg("-voxels").output(&voxels.path()))?;

    let fods = Tissue::ALL.map(|t| dwi.derive(OpTag::Fod(t), stage));
    let mut cmd = ToolInvocation::new("dwi2fod")
        .arg("msmt_csd")
        .arg(dwi.path())
        .arg("-mask")
        .arg(mask.path());
    for (r, fod) in responses.iter().zip(&fods) {
        cmd = cmd.arg(r.path()).output(&fod.path());
    }
    ctx.run(cmd)?;

    let normalised = fods.clone().map(|fod| fod.derive(OpTag::Normalise, stage));
    let mut cmd = ToolInvocation::new("mtnormalise");
    for (fod, norm) in fods.iter().zip(&normalised) {
        cmd = cmd.arg(fod.path()).output(&norm.path());
    }
    ctx.run(cmd.arg("-mask").arg(mask.path()))?;

    let [wm, _, _] = normalised;
    Ok(wm)
}

fn single_tissue_fod(ctx: &mut PipelineContext<'_>, dwi: &Artifact, mask: &Artifact) -> Result<Artifact> {
    let stage = ctx.stage();
    let wm_response = response(dwi, Tissue::WhiteMatter, stage);
    let voxels = dwi.derive(OpTag::ResponseVoxels, stage);
    ctx.run(
        ToolInvocation::new("dwi2response")
            .arg("tournier")
            .arg(dwi.path())
            .output(&wm_response.path())
            .arg("-voxels")
            .output(&voxels.path()),
    )?;

    let wm_fod = dwi.derive(OpTag::Fod(Tissue::WhiteMatter), stage);
    ctx.run(
        ToolInvocation::new("dwi2fod")
            .arg("csd")
            .arg(dwi.path())
            .arg("-mask")
            .arg(mask.path())
            .arg(wm_response.path())
            .output(&wm_fod.path()),
    )?;
    Ok(wm_fod)
}

/// Streamlines seeded dynamically from the FOD field and constrained to the
/// mask, standing in for anatomically-constrained tracking.
fn direct_tractography(
    ctx: &mut PipelineContext<'_>,
    wm_fod: &Artifact,
    mask: &Artifact,
    config: &TractographyConfig,
) -> Result<Artifact> {
    let tracks = wm_fod.derive_as(OpTag::Tracking, ImageFormat::Tck, ctx.stage());
    ctx.run(
        ToolInvocation::new("tckgen")
            .arg(wm_fod.path())
            .output(&tracks.path())
            .arg("-seed_dynamic")
            .arg(wm_fod.path())
            .arg("-mask")
            .arg(mask.path())
            .arg("-select")
            .arg(config.streamlines.to_string())
            .arg("-minlength")
            .arg(config.min_length_mm.to_string()),
    )?;
    ctx.info(format!("Direct tractography written to {}", tracks.id));
    Ok(tracks)
}

use crate::artifact::{Artifact, ImageFormat, OpTag};
use crate::consts::RIGID_DOF;
use crate::context::PipelineContext;
use crate::error::Result;
use crate::tool::ToolInvocation;

use super::convert::{mif_to_nifti, nifti_to_mif};
use super::preprocess::temporal_mean;

#[derive(Clone, Debug)]
pub struct StructuralCoregOutput {
    /// Anatomical reference resampled into diffusion space.
    pub anatomical: Artifact,
    /// Diffusion-to-anatomical rigid transform (MRtrix format).
    pub transform: Artifact,
    /// Five-tissue-type segmentation in diffusion space.
    pub tissue: Artifact,
    /// Grey/white-matter interface seed mask in diffusion space.
    pub seed: Artifact,
}

#[derive(Clone, Debug)]
pub struct AuxiliaryCoregOutput {
    pub sequence: Artifact,
}

/// Rigidly register the DWI mean b0 to the anatomical reference, then bring
/// the anatomical volume and its tissue segmentation into diffusion space.
pub fn run_structural_coregistration(
    ctx: &mut PipelineContext<'_>,
    anatomical: &Artifact,
    dwi: &Artifact,
) -> Result<StructuralCoregOutput> {
    anatomical.require_nifti()?;
    dwi.require_format(ImageFormat::Mif)?;
    let stage = ctx.stage();

    let b0 = dwi.derive(OpTag::Bzero, stage);
    ctx.run(
        ToolInvocation::new("dwiextract")
            .arg(dwi.path())
            .output(&b0.path())
            .arg("-bzero"),
    )?;
    let b0_mean = b0.derive(OpTag::Mean, stage);
    ctx.run(temporal_mean(&b0, &b0_mean))?;
    let b0_mean_nifti = mif_to_nifti(ctx, &b0_mean, &b0_mean.dir)?;

    let fsl_matrix = b0_mean_nifti.derive_as(OpTag::Rigid, ImageFormat::FslMatrix, stage);
    ctx.run(
        ToolInvocation::new("flirt")
            .arg("-in")
            .arg(b0_mean_nifti.path())
            .arg("-ref")
            .arg(anatomical.path())
            .arg("-interp")
            .arg("nearestneighbour")
            .arg("-dof")
            .arg(RIGID_DOF.to_string())
            .arg("-omat")
            .output(&fsl_matrix.path()),
    )?;

    let transform = fsl_matrix.converted(ImageFormat::Text, &fsl_matrix.dir, stage);
    ctx.run(
        ToolInvocation::new("transformconvert")
            .arg(fsl_matrix.path())
            .arg(b0_mean_nifti.path())
            .arg(anatomical.path())
            .arg("flirt_import")
            .output(&transform.path()),
    )?;

    let tissue = anatomical.derive(OpTag::FiveTissue, stage);
    ctx.run(
        ToolInvocation::new("5ttgen")
            .arg("fsl")
            .arg(anatomical.path())
            .output(&tissue.path()),
    )?;

    let anatomical_dwi = anatomical.derive_as(OpTag::CoregDwi, ImageFormat::Mif, stage);
    ctx.run(inverse_transform(anatomical, &transform, &anatomical_dwi))?;
    let tissue_dwi = tissue.derive_as(OpTag::CoregDwi, ImageFormat::Mif, stage);
    ctx.run(inverse_transform(&tissue, &transform, &tissue_dwi))?;

    let seed = tissue_dwi.derive_as(OpTag::GmWmInterface, ImageFormat::NiftiGz, stage);
    ctx.run(
        ToolInvocation::new("5tt2gmwmi")
            .arg(tissue_dwi.path())
            .output(&seed.path()),
    )?;

    ctx.info(format!("{} coregistered to DWI", anatomical.id));
    Ok(StructuralCoregOutput {
        anatomical: anatomical_dwi,
        transform,
        tissue: tissue_dwi,
        seed,
    })
}

/// Register a secondary sequence to the anatomical reference and move it
/// into diffusion space with the inverse structural transform.
pub fn run_auxiliary_coregistration(
    ctx: &mut PipelineContext<'_>,
    sequence: &Artifact,
    anatomical: &Artifact,
    transform: &Artifact,
) -> Result<AuxiliaryCoregOutput> {
    sequence.require_nifti()?;
    transform.require_format(ImageFormat::Text)?;
    let stage = ctx.stage();

    let on_anatomical = sequence.derive(OpTag::CoregAnat, stage);
    ctx.run(
        ToolInvocation::new("flirt")
            .arg("-in")
            .arg(sequence.path())
            .arg("-ref")
            .arg(anatomical.path())
            .arg("-dof")
            .arg(RIGID_DOF.to_string())
            .arg("-out")
            .output(&on_anatomical.path()),
    )?;
    let on_anatomical_mif = nifti_to_mif(ctx, &on_anatomical, None, &on_anatomical.dir)?;

    let on_dwi = on_anatomical_mif.derive(OpTag::CoregDwi, stage);
    ctx.run(inverse_transform(&on_anatomical_mif, transform, &on_dwi))?;

    ctx.info(format!("{} coregistered to DWI", sequence.id));
    Ok(AuxiliaryCoregOutput { sequence: on_dwi })
}

fn inverse_transform(input: &Artifact, transform: &Artifact, output: &Artifact) -> ToolInvocation {
    ToolInvocation::new("mrtransform")
        .arg(input.path())
        .arg("-linear")
        .arg(transform.path())
        .arg("-inverse")
        .output(&output.path())
}

use std::path::Path;

use crate::artifact::{Artifact, ImageFormat};
use crate::context::PipelineContext;
use crate::error::{DwiflowError, Result};
use crate::selector::SequenceSelection;
use crate::sequence::{AcquiredSequence, GradientTable};
use crate::sidecar::{read_acquisition_params, AcquisitionParams};
use crate::tool::ToolInvocation;

use super::preprocess::PepolarInput;
use super::types::{RpeMode, StageKind};

/// Selected sequences in the representations the stages expect.
#[derive(Clone, Debug)]
pub struct AdaptedInputs {
    /// DWI in MIF format with its gradient table embedded.
    pub dwi: Artifact,
    pub params: AcquisitionParams,
    /// Primary anatomical reference, NIfTI copy in the working directory.
    pub anatomical: Option<Artifact>,
    /// Secondary sequence, NIfTI copy in the working directory.
    pub auxiliary: Option<Artifact>,
    pub pepolar: Option<PepolarInput>,
}

/// Convert a NIfTI image to MIF, embedding the FSL gradient table if given.
pub fn nifti_to_mif(
    ctx: &mut PipelineContext<'_>,
    input: &Artifact,
    gradient: Option<&GradientTable>,
    dir: &Path,
) -> Result<Artifact> {
    input.require_nifti()?;
    let output = input.converted(ImageFormat::Mif, dir, ctx.stage());
    let mut cmd = ToolInvocation::new("mrconvert")
        .arg(input.path())
        .output(&output.path());
    if let Some(table) = gradient {
        cmd = cmd.arg("-fslgrad").arg(&table.bvec).arg(&table.bval);
    }
    ctx.run(cmd)?;
    Ok(output)
}

/// Convert a MIF image to compressed NIfTI.
pub fn mif_to_nifti(ctx: &mut PipelineContext<'_>, input: &Artifact, dir: &Path) -> Result<Artifact> {
    input.require_format(ImageFormat::Mif)?;
    let output = input.converted(ImageFormat::NiftiGz, dir, ctx.stage());
    ctx.run(
        ToolInvocation::new("mrconvert")
            .arg(input.path())
            .output(&output.path()),
    )?;
    Ok(output)
}

fn copy_into(ctx: &PipelineContext<'_>, sequence: &AcquiredSequence, dir: &Path) -> Result<Artifact> {
    let destination = dir.join(sequence.file_name());
    std::fs::copy(&sequence.path, &destination)?;
    Artifact::from_path(&destination, ctx.stage())
}

/// Bring the selected sequences into the working directory in the formats
/// the stages consume, and read the DWI acquisition parameters. The pepolar
/// sequence is only converted when `mode` uses it.
pub fn adapt_sequences(
    ctx: &mut PipelineContext<'_>,
    selection: &SequenceSelection,
    mode: RpeMode,
) -> Result<AdaptedInputs> {
    let dir = ctx.layout().preprocessing_dir();

    let gradient = selection
        .dwi
        .gradient
        .as_ref()
        .ok_or_else(|| DwiflowError::Format {
            path: selection.dwi.path.clone(),
            expected: "diffusion NIfTI with .bvec/.bval gradient table".into(),
        })?;
    let params = read_acquisition_params(&selection.dwi.sidecar_path())?;
    ctx.info(format!(
        "Readout time {} s, phase encoding {}",
        params.readout_time, params.phase_encoding_direction
    ));
    let raw_dwi = Artifact::from_path(&selection.dwi.path, StageKind::Selection)?;
    let dwi = nifti_to_mif(ctx, &raw_dwi, Some(gradient), &dir)?;

    let anatomical = selection
        .anatomical
        .as_ref()
        .map(|seq| copy_into(ctx, seq, &dir))
        .transpose()?;
    let auxiliary = selection
        .auxiliary
        .as_ref()
        .map(|seq| copy_into(ctx, seq, &dir))
        .transpose()?;

    // A reversed full diffusion acquisition is converted with its gradients
    // so its b0 volumes can be extracted later.
    let pepolar = match selection.pepolar {
        Some(ref seq) if mode != RpeMode::Pair => {
            ctx.info(format!(
                "Pepolar sequence {} ignored (correction mode {mode})",
                seq.file_name()
            ));
            None
        }
        Some(ref seq) => {
            let raw = Artifact::from_path(&seq.path, StageKind::Selection)?;
            let artifact = nifti_to_mif(ctx, &raw, seq.gradient.as_ref(), &dir)?;
            Some(PepolarInput {
                artifact,
                has_gradients: seq.gradient.is_some(),
            })
        }
        None => None,
    };

    ctx.info(format!("Conversion done, sequences found: {:?}", selection.found()));
    Ok(AdaptedInputs {
        dwi,
        params,
        anatomical,
        auxiliary,
        pepolar,
    })
}

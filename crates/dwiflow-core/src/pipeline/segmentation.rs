use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::context::PipelineContext;
use crate::error::Result;
use crate::tool::ToolInvocation;

/// `TractSeg` output types, in the order they must run: each one reads the
/// results of the previous ones.
pub const SEGMENTATION_OUTPUT_TYPES: [&str; 3] =
    ["tract_segmentation", "endings_segmentation", "TOM"];

#[derive(Clone, Debug)]
pub struct SegmentationOutput {
    pub output_dir: PathBuf,
}

/// Bundle segmentation, tract orientation maps, tracking and uncertainty
/// from the peaks image.
pub fn run_segmentation(
    ctx: &mut PipelineContext<'_>,
    peaks: &Artifact,
    output_dir: &Path,
) -> Result<SegmentationOutput> {
    peaks.require_nifti()?;
    std::fs::create_dir_all(output_dir)?;

    let base = |program: &str| {
        ToolInvocation::new(program)
            .arg("-i")
            .arg(peaks.path())
            .arg("-o")
            .arg(output_dir)
    };

    for output_type in SEGMENTATION_OUTPUT_TYPES {
        ctx.run(base("TractSeg").arg("--output_type").arg(output_type))?;
    }
    ctx.run(base("Tracking").arg("--tracking_format").arg("tck"))?;
    ctx.run(base("TractSeg").arg("--uncertainty"))?;

    ctx.info("TractSeg done");
    Ok(SegmentationOutput {
        output_dir: output_dir.to_path_buf(),
    })
}

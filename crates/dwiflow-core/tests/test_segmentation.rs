mod common;

use dwiflow_core::artifact::ImageFormat;
use dwiflow_core::error::DwiflowError;
use dwiflow_core::pipeline::{run_segmentation, StageKind, SEGMENTATION_OUTPUT_TYPES};

use common::{arg_after, ScriptedRunner};

#[test]
fn test_segmentation_sequence() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Segmentation);
    let peaks = common::artifact(
        &ctx.layout().preprocessing_dir(),
        "dwi_wmfod_peaks",
        ImageFormat::NiftiGz,
    );
    let out_dir = ctx.layout().segmentation_dir();

    let output = run_segmentation(&mut ctx, &peaks, &out_dir).unwrap();
    assert_eq!(output.output_dir, out_dir);
    assert!(out_dir.is_dir());

    let calls = runner.calls();
    assert_eq!(calls.len(), 5);
    for (call, output_type) in calls.iter().zip(SEGMENTATION_OUTPUT_TYPES) {
        assert_eq!(call.program, "TractSeg");
        assert_eq!(arg_after(call, "--output_type").as_deref(), Some(output_type));
    }
    assert_eq!(calls[3].program, "Tracking");
    assert_eq!(arg_after(&calls[3], "--tracking_format").as_deref(), Some("tck"));
    assert_eq!(calls[4].program, "TractSeg");
    assert!(calls[4].has_arg("--uncertainty"));

    for call in &calls {
        assert_eq!(arg_after(call, "-i"), Some(peaks.path().display().to_string()));
        assert_eq!(arg_after(call, "-o"), Some(out_dir.display().to_string()));
    }
}

#[test]
fn test_segmentation_output_order() {
    assert_eq!(
        SEGMENTATION_OUTPUT_TYPES,
        ["tract_segmentation", "endings_segmentation", "TOM"]
    );
}

#[test]
fn test_segmentation_requires_nifti_peaks() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Segmentation);
    let peaks = common::artifact(
        &ctx.layout().preprocessing_dir(),
        "dwi_wmfod_peaks",
        ImageFormat::Mif,
    );
    let out_dir = ctx.layout().segmentation_dir();

    let err = run_segmentation(&mut ctx, &peaks, &out_dir).unwrap_err();
    assert!(matches!(err, DwiflowError::Format { .. }));
    assert!(runner.calls().is_empty());
    assert!(!out_dir.exists());
}

#[test]
fn test_segmentation_stops_on_failure() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().failing("Tracking", 1, "Tracking: TOM missing");
    let mut ctx = common::context(&runner, root.path(), StageKind::Segmentation);
    let peaks = common::artifact(
        &ctx.layout().preprocessing_dir(),
        "dwi_wmfod_peaks",
        ImageFormat::NiftiGz,
    );
    let out_dir = ctx.layout().segmentation_dir();

    let err = run_segmentation(&mut ctx, &peaks, &out_dir).unwrap_err();
    assert_eq!(err.diagnostic(), "Tracking: TOM missing");
    assert_eq!(runner.calls().len(), 4);
}

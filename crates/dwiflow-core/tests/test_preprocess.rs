mod common;

use std::path::Path;

use dwiflow_core::artifact::{Artifact, ImageFormat};
use dwiflow_core::context::DiagnosticLevel;
use dwiflow_core::error::DwiflowError;
use dwiflow_core::pipeline::{
    fslpreproc_invocation, run_preprocessing, PepolarInput, PreprocessInputs, RpeMode, StageKind,
};
use dwiflow_core::shell::ShellKind;
use dwiflow_core::sidecar::AcquisitionParams;

use common::{arg_after, ScriptedRunner};

fn params() -> AcquisitionParams {
    AcquisitionParams {
        readout_time: 0.05,
        phase_encoding_direction: "j-".into(),
    }
}

fn dwi(dir: &Path) -> Artifact {
    common::artifact(dir, "sub-01_ses-01_dwi", ImageFormat::Mif)
}

fn pepolar(dir: &Path, has_gradients: bool) -> PepolarInput {
    PepolarInput {
        artifact: common::artifact(dir, "sub-01_ses-01_dir-PA_epi", ImageFormat::Mif),
        has_gradients,
    }
}

fn inputs<'i>(
    dwi: &'i Artifact,
    params: &'i AcquisitionParams,
    mode: RpeMode,
    pepolar: Option<&'i PepolarInput>,
) -> PreprocessInputs<'i> {
    PreprocessInputs {
        dwi,
        params,
        shell: ShellKind::Single,
        mode,
        pepolar,
        partial_brain: false,
    }
}

// ---------------------------------------------------------------------------
// Whole-brain, no reversed phase
// ---------------------------------------------------------------------------

#[test]
fn test_whole_brain_chain() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    let output = run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::None, None)).unwrap();

    assert_eq!(
        runner.programs(),
        vec!["dwidenoise", "mrdegibbs", "dwifslpreproc", "dwibiascorrect", "dwi2mask"]
    );
    assert_eq!(
        output.dwi.id.file_name(),
        "sub-01_ses-01_dwi_denoise_degibbs_fslpreproc_unbias.mif"
    );
    assert!(output.dwi.path().exists());
    assert!(output.mask.path().exists());
    assert!(output.reference_pair.is_none());
    assert_eq!(output.mask.producer, StageKind::Preprocessing);
}

#[test]
fn test_fslpreproc_without_reversed_phase() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::None, None)).unwrap();

    let preproc = runner.calls_of("dwifslpreproc").remove(0);
    assert!(preproc.has_arg("-rpe_none"));
    assert!(!preproc.has_arg("-se_epi"));
    assert_eq!(arg_after(&preproc, "-pe_dir").as_deref(), Some("j-"));
    assert_eq!(arg_after(&preproc, "-readout_time").as_deref(), Some("0.05"));
    assert_eq!(arg_after(&preproc, "-eddy_options").as_deref(), Some("--slm=linear "));
}

#[test]
fn test_bias_correction_uses_ants() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::None, None)).unwrap();
    assert_eq!(runner.calls_of("dwibiascorrect")[0].args_lossy()[0], "ants");
}

#[test]
fn test_multi_shell_eddy_options() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();
    let mut inputs = inputs(&dwi, &params, RpeMode::None, None);
    inputs.shell = ShellKind::Multi;

    run_preprocessing(&mut ctx, inputs).unwrap();
    let preproc = runner.calls_of("dwifslpreproc").remove(0);
    assert_eq!(
        arg_after(&preproc, "-eddy_options").as_deref(),
        Some("--slm=linear --data_is_shelled")
    );
}

// ---------------------------------------------------------------------------
// Reference pair
// ---------------------------------------------------------------------------

#[test]
fn test_pair_from_b0_pepolar() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dir = ctx.layout().preprocessing_dir();
    let dwi = dwi(&dir);
    let pepolar = pepolar(&dir, false);
    let params = params();

    let output = run_preprocessing(
        &mut ctx,
        inputs(&dwi, &params, RpeMode::Pair, Some(&pepolar)),
    )
    .unwrap();

    assert_eq!(
        runner.programs(),
        vec![
            "dwidenoise",
            "mrdegibbs",
            "mrinfo",
            "mrmath",
            "dwiextract",
            "mrmath",
            "mrcat",
            "dwifslpreproc",
            "dwibiascorrect",
            "dwi2mask",
        ]
    );
    let pair = output.reference_pair.unwrap();
    assert!(pair.path().exists());

    let preproc = runner.calls_of("dwifslpreproc").remove(0);
    assert!(preproc.has_arg("-rpe_pair"));
    assert_eq!(
        arg_after(&preproc, "-se_epi"),
        Some(pair.path().display().to_string())
    );

    // DWI b0 mean first, pepolar mean second.
    let mrcat = runner.calls_of("mrcat")[0].args_lossy();
    assert!(mrcat[0].ends_with("sub-01_ses-01_dwi_bzero_mean.mif"));
    assert!(mrcat[1].ends_with("sub-01_ses-01_dir-PA_epi_mean.mif"));
}

#[test]
fn test_pair_extracts_b0_from_diffusion_pepolar() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().with_shells("epi", "0 1000 2000\n");
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dir = ctx.layout().preprocessing_dir();
    let dwi = dwi(&dir);
    let pepolar = pepolar(&dir, true);
    let params = params();

    run_preprocessing(
        &mut ctx,
        inputs(&dwi, &params, RpeMode::Pair, Some(&pepolar)),
    )
    .unwrap();

    let extracts = runner.calls_of("dwiextract");
    assert_eq!(extracts.len(), 2);
    assert_eq!(extracts[0].args[0], pepolar.artifact.path().into_os_string());
    assert!(extracts[0].has_arg("-bzero"));
    let mrcat = runner.calls_of("mrcat")[0].args_lossy();
    assert!(mrcat[1].ends_with("sub-01_ses-01_dir-PA_epi_bzero_mean.mif"));
}

#[test]
fn test_pair_b0_only_pepolar_with_gradients() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().with_shells("epi", "0\n");
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dir = ctx.layout().preprocessing_dir();
    let dwi = dwi(&dir);
    let pepolar = pepolar(&dir, true);
    let params = params();

    run_preprocessing(
        &mut ctx,
        inputs(&dwi, &params, RpeMode::Pair, Some(&pepolar)),
    )
    .unwrap();

    // Only the DWI b0 volumes are extracted.
    assert_eq!(runner.count("dwiextract"), 1);
    assert_eq!(runner.count("mrinfo"), 2);
}

#[test]
fn test_pair_single_volume_pepolar() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().with_ndim(3);
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dir = ctx.layout().preprocessing_dir();
    let dwi = dwi(&dir);
    let pepolar = pepolar(&dir, false);
    let params = params();

    run_preprocessing(
        &mut ctx,
        inputs(&dwi, &params, RpeMode::Pair, Some(&pepolar)),
    )
    .unwrap();

    // A 3D volume is used as is; only the DWI b0 mean is computed.
    assert_eq!(runner.count("mrmath"), 1);
    assert!(dir.join("sub-01_ses-01_dir-PA_epi_mean.mif").exists());
}

#[test]
fn test_pair_without_pepolar() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    let err = run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::Pair, None)).unwrap_err();
    assert!(matches!(err, DwiflowError::Config(_)));
    assert!(runner.count("dwifslpreproc") == 0);
}

// ---------------------------------------------------------------------------
// Other modes
// ---------------------------------------------------------------------------

#[test]
fn test_all_mode_skips_correction() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    let output = run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::All, None)).unwrap();

    assert_eq!(runner.count("dwifslpreproc"), 0);
    assert_eq!(
        output.dwi.id.file_name(),
        "sub-01_ses-01_dwi_denoise_degibbs_unbias.mif"
    );
    let (_, diagnostics) = ctx.into_parts();
    assert_eq!(diagnostics.with_level(DiagnosticLevel::Warning).count(), 1);
}

#[test]
fn test_fslpreproc_all_form() {
    let dir = Path::new("/work");
    let input = Artifact::from_path(&dir.join("dwi.mif"), StageKind::Preprocessing).unwrap();
    let output = Artifact::from_path(&dir.join("dwi_fslpreproc.mif"), StageKind::Preprocessing)
        .unwrap();
    let cmd = fslpreproc_invocation(
        &input,
        &output,
        &params(),
        RpeMode::All,
        None,
        ShellKind::Multi,
    );
    assert!(cmd.has_arg("-rpe_all"));
    assert_eq!(cmd.outputs, vec![output.path()]);
}

// ---------------------------------------------------------------------------
// Partial brain
// ---------------------------------------------------------------------------

#[test]
fn test_partial_brain_mask() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();
    let mut inputs = inputs(&dwi, &params, RpeMode::None, None);
    inputs.partial_brain = true;

    let output = run_preprocessing(&mut ctx, inputs).unwrap();

    assert_eq!(
        runner.programs(),
        vec![
            "dwidenoise",
            "mrdegibbs",
            "dwifslpreproc",
            "dwibiascorrect",
            "mrgrid",
            "mrmath",
            "mrthreshold",
            "mrfilter",
            "mrfilter",
        ]
    );
    assert_eq!(runner.count("dwi2mask"), 0);

    let regrid = runner.calls_of("mrgrid").remove(0);
    assert!(regrid.has_arg("regrid"));
    assert_eq!(arg_after(&regrid, "-vox").as_deref(), Some("1"));
    let threshold = runner.calls_of("mrthreshold").remove(0);
    assert_eq!(arg_after(&threshold, "-abs").as_deref(), Some("2"));

    assert!(output.dwi.id.stem().ends_with("_unbias_regrid"));
    assert!(output.mask.id.stem().ends_with("_mean_thres_filt_filt"));
}

#[test]
fn test_first_failure_stops_stage() {
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().failing("mrdegibbs", 1, "mrdegibbs: out of memory");
    let mut ctx = common::context(&runner, root.path(), StageKind::Preprocessing);
    let dwi = dwi(&ctx.layout().preprocessing_dir());
    let params = params();

    let err = run_preprocessing(&mut ctx, inputs(&dwi, &params, RpeMode::None, None)).unwrap_err();
    assert_eq!(err.diagnostic(), "mrdegibbs: out of memory");
    assert_eq!(runner.programs(), vec!["dwidenoise", "mrdegibbs"]);
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dwiflow_core::artifact::{Artifact, ArtifactId, ImageFormat};
use dwiflow_core::context::PipelineContext;
use dwiflow_core::layout::SessionLayout;
use dwiflow_core::pipeline::config::PipelineConfig;
use dwiflow_core::pipeline::StageKind;
use dwiflow_core::tool::{ToolInvocation, ToolOutput, ToolRunner};

pub const SUBJECT: &str = "01";
pub const SESSION: &str = "01";

pub const SIDECAR_JSON: &str =
    r#"{"TotalReadoutTime": 0.05, "PhaseEncodingDirection": "j-", "EchoTime": 0.089}"#;

/// Injected failure: `program`, optionally only when `arg` is present.
struct Failure {
    program: String,
    arg: Option<String>,
    output: ToolOutput,
}

/// Tool runner that records every invocation instead of launching it.
///
/// Successful invocations create empty files at their declared outputs.
/// `mrinfo` queries are answered from canned listings.
pub struct ScriptedRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    default_shells: String,
    shells: Vec<(String, String)>,
    ndim: String,
    failures: Vec<Failure>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            default_shells: "0 1000\n".into(),
            shells: Vec::new(),
            ndim: "4\n".into(),
            failures: Vec::new(),
        }
    }

    /// Shell listing returned for every image.
    pub fn with_default_shells(mut self, listing: &str) -> Self {
        self.default_shells = listing.into();
        self
    }

    /// Shell listing returned for images whose file name contains `pattern`.
    pub fn with_shells(mut self, pattern: &str, listing: &str) -> Self {
        self.shells.push((pattern.into(), listing.into()));
        self
    }

    pub fn with_ndim(mut self, ndim: u32) -> Self {
        self.ndim = format!("{ndim}\n");
        self
    }

    /// Make every call of `program` exit with `code` and `stderr`.
    pub fn failing(mut self, program: &str, code: i32, stderr: &str) -> Self {
        self.failures.push(Failure {
            program: program.into(),
            arg: None,
            output: ToolOutput::failure(code, stderr),
        });
        self
    }

    /// Make calls of `program` carrying `arg` exit with `code` and `stderr`.
    pub fn failing_with_arg(mut self, program: &str, arg: &str, code: i32, stderr: &str) -> Self {
        self.failures.push(Failure {
            program: program.into(),
            arg: Some(arg.into()),
            output: ToolOutput::failure(code, stderr),
        });
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn calls_of(&self, program: &str) -> Vec<ToolInvocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls_of(program).len()
    }

    fn shell_listing(&self, invocation: &ToolInvocation) -> String {
        let name = invocation
            .args
            .first()
            .and_then(|a| Path::new(a).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.shells
            .iter()
            .find(|(pattern, _)| name.contains(pattern.as_str()))
            .map(|(_, listing)| listing.clone())
            .unwrap_or_else(|| self.default_shells.clone())
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let failure = self.failures.iter().find(|f| {
            f.program == invocation.program
                && f.arg.as_deref().map_or(true, |arg| invocation.has_arg(arg))
        });
        if let Some(failure) = failure {
            return Ok(failure.output.clone());
        }

        if invocation.program == "mrinfo" {
            if invocation.has_arg("-shell_bvalues") {
                return Ok(ToolOutput::success(self.shell_listing(invocation)));
            }
            if invocation.has_arg("-ndim") {
                return Ok(ToolOutput::success(self.ndim.clone()));
            }
        }

        for output in &invocation.outputs {
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output, b"")?;
        }
        Ok(ToolOutput::success(""))
    }
}

// ---------------------------------------------------------------------------
// BIDS session fixtures
// ---------------------------------------------------------------------------

pub fn session_dir(root: &Path) -> PathBuf {
    root.join(format!("sub-{SUBJECT}")).join(format!("ses-{SESSION}"))
}

fn write_image(root: &Path, datatype: &str, stem: &str) -> PathBuf {
    let dir = session_dir(root).join(datatype);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{stem}.nii.gz"));
    std::fs::write(&path, b"nifti").unwrap();
    path
}

fn write_gradients(image: &Path, stem: &str) {
    let dir = image.parent().unwrap();
    std::fs::write(dir.join(format!("{stem}.bvec")), "0 1 0\n0 0 1\n0 0 0\n").unwrap();
    std::fs::write(dir.join(format!("{stem}.bval")), "0 1000 1000\n").unwrap();
}

/// Diffusion series with gradient table and sidecar.
pub fn write_dwi(root: &Path, stem: &str) -> PathBuf {
    let path = write_image(root, "dwi", stem);
    write_gradients(&path, stem);
    std::fs::write(path.with_file_name(format!("{stem}.json")), SIDECAR_JSON).unwrap();
    path
}

pub fn write_default_dwi(root: &Path) -> PathBuf {
    write_dwi(root, "sub-01_ses-01_dwi")
}

/// Anatomical series with the given BIDS suffix (`T1w`, `FLAIR`).
pub fn write_anat(root: &Path, suffix: &str) -> PathBuf {
    write_image(root, "anat", &format!("sub-01_ses-01_{suffix}"))
}

pub fn write_pepolar(root: &Path, with_gradients: bool) -> PathBuf {
    let stem = "sub-01_ses-01_dir-PA_epi";
    let path = write_image(root, "fmap", stem);
    if with_gradients {
        write_gradients(&path, stem);
    }
    path
}

pub fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::new(root, SUBJECT, SESSION)
}

pub fn layout(root: &Path) -> SessionLayout {
    SessionLayout::new(root, SUBJECT, SESSION)
}

/// Context with a prepared output tree, positioned in `stage`.
pub fn context<'a>(runner: &'a ScriptedRunner, root: &Path, stage: StageKind) -> PipelineContext<'a> {
    let layout = layout(root);
    layout.prepare(false).unwrap();
    let mut ctx = PipelineContext::new(runner, layout);
    ctx.enter(stage);
    ctx
}

/// Existing artifact file in `dir`.
pub fn artifact(dir: &Path, base: &str, format: ImageFormat) -> Artifact {
    let artifact = Artifact::new(ArtifactId::new(base, format), dir, StageKind::FormatAdaptation);
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(artifact.path(), b"").unwrap();
    artifact
}

pub fn arg_after(invocation: &ToolInvocation, flag: &str) -> Option<String> {
    let args = invocation.args_lossy();
    let i = args.iter().position(|a| a == flag)?;
    args.get(i + 1).cloned()
}

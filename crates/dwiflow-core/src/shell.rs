use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ImageFormat};
use crate::context::PipelineContext;
use crate::error::{DwiflowError, Result};
use crate::tool::ToolInvocation;

/// Shell structure of a diffusion acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellKind {
    Single,
    Multi,
}

impl ShellKind {
    pub fn is_multi(self) -> bool {
        self == Self::Multi
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single-shell"),
            Self::Multi => write!(f, "multi-shell"),
        }
    }
}

/// Distinct nonzero b-values of a diffusion dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellProfile {
    bvalues: BTreeSet<u32>,
}

impl ShellProfile {
    /// Build from raw b-values; b=0 volumes are dropped.
    pub fn from_bvalues(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            bvalues: values.into_iter().filter(|&b| b != 0).collect(),
        }
    }

    /// Parse a whitespace-separated b-value listing such as `0 1000 2000`.
    pub fn parse(listing: &str) -> Result<Self> {
        let values = listing
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|b| b.is_finite() && *b >= 0.0)
                    .map(|b| b.round() as u32)
                    .ok_or_else(|| DwiflowError::Parse(format!("invalid b-value `{token}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_bvalues(values))
    }

    pub fn bvalues(&self) -> impl Iterator<Item = u32> + '_ {
        self.bvalues.iter().copied()
    }

    pub fn shell_count(&self) -> usize {
        self.bvalues.len()
    }

    /// No diffusion-weighted shell at all (b=0 volumes only).
    pub fn is_empty(&self) -> bool {
        self.bvalues.is_empty()
    }

    pub fn kind(&self) -> ShellKind {
        if self.bvalues.len() > 1 {
            ShellKind::Multi
        } else {
            ShellKind::Single
        }
    }
}

/// Query the shells of a MIF diffusion artifact.
pub fn query_shells(ctx: &mut PipelineContext<'_>, artifact: &Artifact) -> Result<ShellProfile> {
    artifact.require_format(ImageFormat::Mif)?;
    let output = ctx.run(
        ToolInvocation::new("mrinfo")
            .arg(artifact.path())
            .arg("-shell_bvalues"),
    )?;
    ShellProfile::parse(&output.stdout)
}

/// Classify a diffusion artifact as single- or multi-shell.
pub fn classify_shells(ctx: &mut PipelineContext<'_>, artifact: &Artifact) -> Result<ShellKind> {
    let profile = query_shells(ctx, artifact)?;
    let kind = profile.kind();
    ctx.info(format!(
        "{} has {} shell(s) {:?}: {kind}",
        artifact.id,
        profile.shell_count(),
        profile.bvalues().collect::<Vec<_>>()
    ));
    Ok(kind)
}

use std::path::PathBuf;

use thiserror::Error;

use crate::sequence::Modality;

/// Cardinality violation detected while partitioning a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Diffusion image not found, a session with one diffusion sequence is required")]
    NoDiffusion,

    #[error("Too many diffusion sequences ({count}), please select only one")]
    TooManyDiffusion { count: usize },

    #[error("Too many {modality} sequences ({count}), please select only one")]
    TooMany { modality: Modality, count: usize },
}

#[derive(Error, Debug)]
pub enum DwiflowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session directory {0} not found")]
    SessionNotFound(PathBuf),

    #[error("Sequence selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("Sidecar {path} has no usable `{key}` field")]
    SidecarMetadata { path: PathBuf, key: String },

    #[error("Invalid JSON sidecar: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{tool} failed (exit code {code:?}): {diagnostic}")]
    ToolFailure {
        tool: String,
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("Can not launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} reported success but did not write {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{path} is not in {expected} format")]
    Format { path: PathBuf, expected: String },

    #[error("Can not parse tool output: {0}")]
    Parse(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Data already processed for this subject/session in {0} (enable overwrite to repeat)")]
    AlreadyProcessed(PathBuf),
}

impl DwiflowError {
    /// Text surfaced to the user for this failure. For tool failures this is
    /// the captured output of the tool, unmodified.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ToolFailure { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DwiflowError>;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::consts::{DERIVATIVES_DIR, PREPROCESSING_DIR, SEGMENTATION_DIR};
use crate::error::{DwiflowError, Result};

/// Directory layout of one subject/session run.
///
/// Inputs live in `<root>/sub-<id>/ses-<id>/`, outputs in
/// `<root>/derivatives/sub-<id>/ses-<id>/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLayout {
    bids_root: PathBuf,
    subject: String,
    session: String,
}

impl SessionLayout {
    /// Identifiers may be given with or without their `sub-`/`ses-` prefix.
    pub fn new(bids_root: impl Into<PathBuf>, subject: &str, session: &str) -> Self {
        Self {
            bids_root: bids_root.into(),
            subject: subject.strip_prefix("sub-").unwrap_or(subject).to_string(),
            session: session.strip_prefix("ses-").unwrap_or(session).to_string(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn relative(&self) -> PathBuf {
        Path::new(&format!("sub-{}", self.subject)).join(format!("ses-{}", self.session))
    }

    pub fn session_dir(&self) -> PathBuf {
        self.bids_root.join(self.relative())
    }

    /// Consolidated results location.
    pub fn results_dir(&self) -> PathBuf {
        self.bids_root.join(DERIVATIVES_DIR).join(self.relative())
    }

    pub fn preprocessing_dir(&self) -> PathBuf {
        self.results_dir().join(PREPROCESSING_DIR)
    }

    pub fn segmentation_dir(&self) -> PathBuf {
        self.results_dir().join(SEGMENTATION_DIR)
    }

    /// Create the output tree. A preprocessing directory that already holds
    /// more than one entry means the session was processed before: the run
    /// is refused unless `overwrite` is set, in which case the previous
    /// results are removed first.
    pub fn prepare(&self, overwrite: bool) -> Result<()> {
        let preprocessing = self.preprocessing_dir();
        if preprocessing.is_dir() && std::fs::read_dir(&preprocessing)?.count() > 1 {
            if !overwrite {
                return Err(DwiflowError::AlreadyProcessed(self.results_dir()));
            }
            warn!(dir = %self.results_dir().display(), "Removing previous results");
            std::fs::remove_dir_all(self.results_dir())?;
        }
        std::fs::create_dir_all(&preprocessing)?;
        info!(dir = %self.results_dir().display(), "Output directory ready");
        Ok(())
    }
}

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MIN_STREAMLINE_LENGTH_MM, DEFAULT_STREAMLINE_COUNT};
use crate::error::{DwiflowError, Result};

use super::types::RpeMode;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// BIDS dataset root holding `sub-<id>/ses-<id>/`.
    pub bids_root: PathBuf,
    pub subject: String,
    pub session: String,
    /// Restricted field-of-view acquisition.
    #[serde(default)]
    pub partial_brain: bool,
    #[serde(default)]
    pub distortion_correction: DistortionMode,
    /// Replace results of a previous run of the same session.
    #[serde(default)]
    pub overwrite: bool,
    /// Working directory of the external tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub tractography: TractographyConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

impl PipelineConfig {
    pub fn new(bids_root: impl Into<PathBuf>, subject: &str, session: &str) -> Self {
        Self {
            bids_root: bids_root.into(),
            subject: subject.to_string(),
            session: session.to_string(),
            partial_brain: false,
            distortion_correction: DistortionMode::default(),
            overwrite: false,
            working_dir: None,
            tractography: TractographyConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() || self.session.trim().is_empty() {
            return Err(DwiflowError::Config(
                "subject and session identifiers are required".into(),
            ));
        }
        if self.tractography.streamlines == 0 {
            return Err(DwiflowError::Config(
                "tractography.streamlines must be positive".into(),
            ));
        }
        if !(self.tractography.min_length_mm > 0.0) {
            return Err(DwiflowError::Config(
                "tractography.min_length_mm must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Requested motion/distortion correction policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistortionMode {
    /// `Pair` when a pepolar sequence exists, `None` otherwise.
    #[default]
    Auto,
    None,
    Pair,
    All,
}

impl DistortionMode {
    pub fn resolve(self, has_pepolar: bool) -> Result<RpeMode> {
        match (self, has_pepolar) {
            (Self::Auto, true) | (Self::Pair, true) => Ok(RpeMode::Pair),
            (Self::Auto, false) | (Self::None, _) => Ok(RpeMode::None),
            (Self::Pair, false) => Err(DwiflowError::Config(
                "pair distortion correction requires a pepolar sequence".into(),
            )),
            (Self::All, _) => Ok(RpeMode::All),
        }
    }
}

impl fmt::Display for DistortionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::None => write!(f, "None"),
            Self::Pair => write!(f, "Pair"),
            Self::All => write!(f, "All"),
        }
    }
}

/// Direct streamline tractography used on partial-brain data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TractographyConfig {
    #[serde(default = "default_streamlines")]
    pub streamlines: u64,
    #[serde(default = "default_min_length")]
    pub min_length_mm: f32,
}

fn default_streamlines() -> u64 {
    DEFAULT_STREAMLINE_COUNT
}
fn default_min_length() -> f32 {
    DEFAULT_MIN_STREAMLINE_LENGTH_MM
}

impl Default for TractographyConfig {
    fn default() -> Self {
        Self {
            streamlines: DEFAULT_STREAMLINE_COUNT,
            min_length_mm: DEFAULT_MIN_STREAMLINE_LENGTH_MM,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

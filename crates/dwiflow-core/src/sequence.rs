use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::artifact::{ArtifactId, ImageFormat};
use crate::error::{DwiflowError, Result};

/// Acquisition category of a session file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modality {
    Dwi,
    T1w,
    Flair,
    /// Reversed phase-encoding field map.
    Pepolar,
}

impl Modality {
    pub const ALL: [Modality; 4] = [Modality::Dwi, Modality::T1w, Modality::Flair, Modality::Pepolar];

    /// BIDS suffix identifying the modality.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Dwi => "dwi",
            Self::T1w => "T1w",
            Self::Flair => "FLAIR",
            Self::Pepolar => "epi",
        }
    }

    /// Classify a file stem by its trailing BIDS suffix
    /// (`sub-01_ses-01_dir-PA_epi` is pepolar, not DWI).
    pub fn from_stem(stem: &str) -> Option<Self> {
        let suffix = stem.rsplit('_').next()?;
        Self::ALL.into_iter().find(|m| m.keyword() == suffix)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dwi => write!(f, "DWI"),
            Self::T1w => write!(f, "T1w"),
            Self::Flair => write!(f, "FLAIR"),
            Self::Pepolar => write!(f, "pepolar"),
        }
    }
}

/// FSL-style gradient table stored beside a NIfTI image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradientTable {
    pub bvec: PathBuf,
    pub bval: PathBuf,
}

/// An image series found in the session directory. Immutable once discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquiredSequence {
    pub path: PathBuf,
    pub modality: Modality,
    pub gradient: Option<GradientTable>,
    /// JSON sidecar carrying phase-encoding metadata, when present.
    pub sidecar: Option<PathBuf>,
}

impl AcquiredSequence {
    /// Recognise a session file. Returns `None` for anything that is not a
    /// NIfTI image of a known modality.
    pub fn from_path(path: &Path) -> Option<Self> {
        let id = ArtifactId::from_path(path).ok()?;
        if !id.format().is_nifti() {
            return None;
        }
        let modality = Modality::from_stem(id.base())?;
        let sibling = |ext: &str| path.with_file_name(format!("{}.{ext}", id.base()));

        let bvec = sibling("bvec");
        let bval = sibling("bval");
        let gradient = (bvec.is_file() && bval.is_file()).then_some(GradientTable { bvec, bval });
        let sidecar = Some(sibling("json")).filter(|p| p.is_file());

        Some(Self {
            path: path.to_path_buf(),
            modality,
            gradient,
            sidecar,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Expected location of the JSON sidecar, whether or not it exists.
    pub fn sidecar_path(&self) -> PathBuf {
        match &self.sidecar {
            Some(path) => path.clone(),
            None => {
                let stem = ImageFormat::split_file_name(&self.file_name())
                    .map(|(stem, _)| stem.to_string())
                    .unwrap_or_default();
                self.path.with_file_name(format!("{stem}.json"))
            }
        }
    }
}

/// List the image series of a session: `<session>/<datatype>/*.nii[.gz]`.
pub fn discover_session(session_dir: &Path) -> Result<Vec<AcquiredSequence>> {
    if !session_dir.is_dir() {
        return Err(DwiflowError::SessionNotFound(session_dir.to_path_buf()));
    }
    let mut sequences = Vec::new();
    for entry in WalkDir::new(session_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("session walk failed"))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(sequence) = AcquiredSequence::from_path(entry.path()) {
            sequences.push(sequence);
        }
    }
    Ok(sequences)
}

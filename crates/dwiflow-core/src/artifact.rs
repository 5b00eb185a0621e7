use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DwiflowError, Result};
use crate::pipeline::StageKind;

/// On-disk representation of an artifact. Formats are defined by the external
/// tools; the core only tracks which one a file is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImageFormat {
    /// MRtrix image format.
    Mif,
    Nifti,
    NiftiGz,
    /// Plain text (response functions, MRtrix linear transforms).
    Text,
    /// FSL affine matrix.
    FslMatrix,
    /// Streamline file.
    Tck,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mif => "mif",
            Self::Nifti => "nii",
            Self::NiftiGz => "nii.gz",
            Self::Text => "txt",
            Self::FslMatrix => "mat",
            Self::Tck => "tck",
        }
    }

    pub fn is_nifti(self) -> bool {
        matches!(self, Self::Nifti | Self::NiftiGz)
    }

    /// Split a file name into its stem and format. Handles the two-part
    /// `.nii.gz` extension.
    pub fn split_file_name(name: &str) -> Option<(&str, ImageFormat)> {
        if let Some(stem) = name.strip_suffix(".nii.gz") {
            return Some((stem, Self::NiftiGz));
        }
        let (stem, ext) = name.rsplit_once('.')?;
        let format = match ext {
            "mif" => Self::Mif,
            "nii" => Self::Nifti,
            "txt" => Self::Text,
            "mat" => Self::FslMatrix,
            "tck" => Self::Tck,
            _ => return None,
        };
        Some((stem, format))
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mif => write!(f, "MIF"),
            Self::Nifti | Self::NiftiGz => write!(f, "NIfTI"),
            Self::Text => write!(f, "text"),
            Self::FslMatrix => write!(f, "FSL matrix"),
            Self::Tck => write!(f, "TCK"),
        }
    }
}

/// Tissue compartment of a response function or FOD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tissue {
    WhiteMatter,
    GreyMatter,
    Csf,
}

impl Tissue {
    pub const ALL: [Tissue; 3] = [Tissue::WhiteMatter, Tissue::GreyMatter, Tissue::Csf];

    fn abbreviation(self) -> &'static str {
        match self {
            Self::WhiteMatter => "wm",
            Self::GreyMatter => "gm",
            Self::Csf => "csf",
        }
    }
}

/// Transformation applied to an artifact. Each tag contributes one suffix to
/// the derived file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpTag {
    Denoise,
    Degibbs,
    Bzero,
    Mean,
    ReferencePair,
    FslPreproc,
    Unbias,
    Regrid,
    BrainMask,
    Threshold,
    MedianFilter,
    Response(Tissue),
    ResponseVoxels,
    Fod(Tissue),
    Normalise,
    Peaks,
    Tracking,
    Rigid,
    FiveTissue,
    CoregAnat,
    CoregDwi,
    GmWmInterface,
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denoise => write!(f, "denoise"),
            Self::Degibbs => write!(f, "degibbs"),
            Self::Bzero => write!(f, "bzero"),
            Self::Mean => write!(f, "mean"),
            Self::ReferencePair => write!(f, "pair"),
            Self::FslPreproc => write!(f, "fslpreproc"),
            Self::Unbias => write!(f, "unbias"),
            Self::Regrid => write!(f, "regrid"),
            Self::BrainMask => write!(f, "brainmask"),
            Self::Threshold => write!(f, "thres"),
            Self::MedianFilter => write!(f, "filt"),
            Self::Response(t) => write!(f, "{}response", t.abbreviation()),
            Self::ResponseVoxels => write!(f, "responsevoxels"),
            Self::Fod(t) => write!(f, "{}fod", t.abbreviation()),
            Self::Normalise => write!(f, "norm"),
            Self::Peaks => write!(f, "peaks"),
            Self::Tracking => write!(f, "tracks"),
            Self::Rigid => write!(f, "rigid"),
            Self::FiveTissue => write!(f, "5tt"),
            Self::CoregAnat => write!(f, "coreg_anat"),
            Self::CoregDwi => write!(f, "coreg_dwi"),
            Self::GmWmInterface => write!(f, "gmwmi"),
        }
    }
}

/// Typed artifact identifier: a base name plus the ordered list of
/// transformations applied to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    base: String,
    tags: Vec<OpTag>,
    format: ImageFormat,
}

impl ArtifactId {
    pub fn new(base: impl Into<String>, format: ImageFormat) -> Self {
        Self {
            base: base.into(),
            tags: Vec::new(),
            format,
        }
    }

    /// Identify a discovered file. The whole stem becomes the base name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DwiflowError::Format {
                path: path.to_path_buf(),
                expected: "a named image file".into(),
            })?;
        let (stem, format) =
            ImageFormat::split_file_name(name).ok_or_else(|| DwiflowError::Format {
                path: path.to_path_buf(),
                expected: "a known image extension".into(),
            })?;
        Ok(Self::new(stem, format))
    }

    /// Identifier of the result of applying `tag` to this artifact.
    pub fn derive(&self, tag: OpTag) -> Self {
        let mut tags = self.tags.clone();
        tags.push(tag);
        Self {
            base: self.base.clone(),
            tags,
            format: self.format,
        }
    }

    /// Identifier of the same data stored in another representation.
    pub fn convert(&self, format: ImageFormat) -> Self {
        Self {
            base: self.base.clone(),
            tags: self.tags.clone(),
            format,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn tags(&self) -> &[OpTag] {
        &self.tags
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        let mut stem = self.base.clone();
        for tag in &self.tags {
            stem.push('_');
            stem.push_str(&tag.to_string());
        }
        stem
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), self.format.extension())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// An artifact on disk: its identifier, the directory holding it and the
/// stage that produced it. Artifacts are never modified in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub dir: PathBuf,
    pub producer: StageKind,
}

impl Artifact {
    pub fn new(id: ArtifactId, dir: impl Into<PathBuf>, producer: StageKind) -> Self {
        Self {
            id,
            dir: dir.into(),
            producer,
        }
    }

    /// Wrap an existing file.
    pub fn from_path(path: &Path, producer: StageKind) -> Result<Self> {
        let id = ArtifactId::from_path(path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(id, dir, producer))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.id.file_name())
    }

    pub fn format(&self) -> ImageFormat {
        self.id.format()
    }

    /// Successor artifact in the same directory.
    pub fn derive(&self, tag: OpTag, producer: StageKind) -> Self {
        Self::new(self.id.derive(tag), self.dir.clone(), producer)
    }

    /// Successor artifact in the same directory with a different format.
    pub fn derive_as(&self, tag: OpTag, format: ImageFormat, producer: StageKind) -> Self {
        Self::new(self.id.derive(tag).convert(format), self.dir.clone(), producer)
    }

    /// Same data converted to `format`, written into `dir`.
    pub fn converted(&self, format: ImageFormat, dir: &Path, producer: StageKind) -> Self {
        Self::new(self.id.convert(format), dir, producer)
    }

    pub fn require_format(&self, format: ImageFormat) -> Result<()> {
        if self.format() == format {
            Ok(())
        } else {
            Err(DwiflowError::Format {
                path: self.path(),
                expected: format.to_string(),
            })
        }
    }

    pub fn require_nifti(&self) -> Result<()> {
        if self.format().is_nifti() {
            Ok(())
        } else {
            Err(DwiflowError::Format {
                path: self.path(),
                expected: "NIfTI".into(),
            })
        }
    }
}

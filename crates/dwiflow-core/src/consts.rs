/// Absolute intensity threshold applied to the mean DWI in partial-brain
/// masking.
pub const PARTIAL_BRAIN_MASK_THRESHOLD: f32 = 2.0;

/// Number of median-filter passes applied to the thresholded partial-brain
/// mask.
pub const PARTIAL_BRAIN_MEDIAN_PASSES: usize = 2;

/// Isotropic voxel size (mm) used to regrid partial field-of-view data
/// before masking.
pub const REGRID_VOXEL_SIZE_MM: f32 = 1.0;

/// Streamlines selected by the direct tractography pass on partial-brain data.
pub const DEFAULT_STREAMLINE_COUNT: u64 = 1_000_000;

/// Minimum streamline length (mm) kept by the direct tractography pass.
pub const DEFAULT_MIN_STREAMLINE_LENGTH_MM: f32 = 10.0;

/// Degrees of freedom of the rigid-body registrations.
pub const RIGID_DOF: u32 = 6;

/// Sidecar key for the total readout time.
pub const READOUT_TIME_KEY: &str = "TotalReadoutTime";

/// Fallback readout time key written by some vendors (Philips).
pub const READOUT_TIME_FALLBACK_KEY: &str = "EstimatedTotalReadoutTime";

/// Sidecar key for the phase-encoding direction.
pub const PHASE_ENCODING_KEY: &str = "PhaseEncodingDirection";

/// Derivatives root under the BIDS directory.
pub const DERIVATIVES_DIR: &str = "derivatives";

/// Working subdirectory holding every intermediate artifact.
pub const PREPROCESSING_DIR: &str = "preprocessing";

/// Subdirectory receiving the segmentation tool output.
pub const SEGMENTATION_DIR: &str = "tractseg_output";


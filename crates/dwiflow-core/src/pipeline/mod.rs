pub mod config;
mod convert;
mod coreg;
mod fod;
mod orchestrator;
mod preprocess;
mod segmentation;
mod types;

pub use convert::{adapt_sequences, mif_to_nifti, nifti_to_mif, AdaptedInputs};
pub use coreg::{
    run_auxiliary_coregistration, run_structural_coregistration, AuxiliaryCoregOutput,
    StructuralCoregOutput,
};
pub use fod::{run_fod, FodInputs, FodOutput};
pub use orchestrator::{run_pipeline, run_pipeline_reported};
pub use preprocess::{
    fslpreproc_invocation, run_preprocessing, PepolarInput, PreprocessInputs, PreprocessOutput,
};
pub use segmentation::{run_segmentation, SegmentationOutput, SEGMENTATION_OUTPUT_TYPES};
pub use types::{
    PipelineOutput, ProgressReporter, RpeMode, RunOutcome, RunReport, StageKind,
};

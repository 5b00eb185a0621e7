pub mod artifact;
pub mod consts;
pub mod context;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod selector;
pub mod sequence;
pub mod shell;
pub mod sidecar;
pub mod tool;

//! Core building blocks for the FLUX Redux image-conditioning pipeline.
//!
//! This crate holds everything that does not touch a model resource:
//! - `error`: the [`ReduxError`] taxonomy shared by all pipeline crates
//! - `types`: handles, model descriptors, registry records, and the
//!   conditioning output record
//! - `transform`: the pure spatial-downsampling and weighting stage applied
//!   to the projected conditioning tensor

pub mod error;
pub mod transform;
pub mod types;

// Re-export error types for convenient access
pub use error::{ReduxError, ReduxResult};

// Re-export the transform surface
pub use transform::{downsample_and_weight, DownsampleMode, TokenGridPolicy, TransformParams};

// Re-export core types
pub use types::{
    siglip_starter, BaseKind, ConfigOverrides, ImageHandle, InstallJob, ModelConfigRecord,
    ModelDescriptor, ModelKey, ModelKind, ModelSource, ReduxConditioning, StarterModel,
    TensorHandle,
};

//! Core data types for the conditioning pipeline.
//!
//! - `handles`: opaque references into the image and tensor stores
//! - `model`: descriptors, registry records, and installer types
//! - `conditioning`: the output record returned by the orchestrator

mod conditioning;
mod handles;
mod model;

pub use conditioning::ReduxConditioning;
pub use handles::{ImageHandle, ModelKey, TensorHandle};
pub use model::{
    siglip_starter, BaseKind, ConfigOverrides, InstallJob, ModelConfigRecord, ModelDescriptor,
    ModelKind, ModelSource, StarterModel,
};

//! Model layer for the FLUX Redux conditioning pipeline.
//!
//! - `siglip`: image preprocessing and the SigLIP vision transformer
//! - `redux`: the Redux projector mapping embeddings to conditioning space
//! - `registry`: the model-registry trait, the tagged loaded-model union,
//!   and the scoped device-bound guard
//! - `installer`: the installer trait and the cancellation token
//! - `resolver`: descriptor resolution with the install-and-wait fallback
//! - `device`: compute device and precision selection

pub mod device;
pub mod installer;
pub mod redux;
pub mod registry;
pub mod resolver;
pub mod siglip;

pub use device::{preferred_device, preferred_dtype};
pub use installer::{CancelToken, InstallOutcome, ModelInstaller};
pub use redux::ReduxProjector;
pub use registry::{LoadedModel, ModelRegistry, ScopedModel};
pub use resolver::{ModelResolver, ResolverConfig};
pub use siglip::{SigLipImageProcessor, SigLipPipeline, SigLipVisionConfig, SigLipVisionModel};

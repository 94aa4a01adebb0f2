//! FLUX Redux conditioning node.
//!
//! Turns a source image into a conditioning tensor for the FLUX text
//! stream: SigLIP encode, Redux projection, and an optional spatial
//! downsample/weight transform, with the dependent SigLIP encoder installed
//! on demand.
//!
//! - `request`: the invocation request and its validation
//! - `config`: node tunables (install wait bound, token-grid policy)
//! - `stores`: image and tensor persistence collaborator traits
//! - `pipeline`: the orchestrator wiring the stages together

pub mod config;
pub mod pipeline;
pub mod request;
pub mod stores;

pub use config::NodeConfig;
pub use pipeline::FluxReduxPipeline;
pub use request::ReduxRequest;
pub use stores::{ImageStore, TensorStore};

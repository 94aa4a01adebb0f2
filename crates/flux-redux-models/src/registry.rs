//! Model registry trait, the tagged loaded-model union, and the scoped
//! device-bound guard.
//!
//! The registry's storage and indexing internals are an external
//! collaborator. What this module pins down is the loading contract: a load
//! yields a [`ScopedModel`] guard that exclusively owns the weights on the
//! target device for the duration of one pipeline stage. Dropping the guard
//! releases the residency on every exit path, including errors, so at most
//! one auxiliary model is resident from this pipeline's perspective.

use crate::redux::ReduxProjector;
use crate::siglip::SigLipVisionModel;
use async_trait::async_trait;
use candle_core::Device;
use flux_redux_core::{
    ModelConfigRecord, ModelDescriptor, ModelKey, ModelKind, ReduxError, ReduxResult,
};
use std::path::PathBuf;

/// A loaded model behind its kind tag.
///
/// Closed set: the registry entry carries the tag, and pipeline stages check
/// it before use instead of asserting on the object's identity.
pub enum LoadedModel {
    /// SigLIP vision encoder weights.
    SigLip(Box<SigLipVisionModel>),
    /// Redux projector weights.
    Redux(Box<ReduxProjector>),
}

impl LoadedModel {
    /// The kind tag of the loaded weights.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            LoadedModel::SigLip(_) => ModelKind::SigLip,
            LoadedModel::Redux(_) => ModelKind::Redux,
        }
    }

    /// Borrow the SigLIP encoder, or fail with a type mismatch.
    pub fn as_siglip(&self) -> ReduxResult<&SigLipVisionModel> {
        match self {
            LoadedModel::SigLip(model) => Ok(model),
            other => Err(ReduxError::TypeMismatch {
                expected: ModelKind::SigLip,
                actual: other.kind(),
            }),
        }
    }

    /// Borrow the Redux projector, or fail with a type mismatch.
    pub fn as_redux(&self) -> ReduxResult<&ReduxProjector> {
        match self {
            LoadedModel::Redux(model) => Ok(model),
            other => Err(ReduxError::TypeMismatch {
                expected: ModelKind::Redux,
                actual: other.kind(),
            }),
        }
    }
}

/// RAII guard owning one model's weights on a device.
///
/// Created by [`ModelRegistry::load`]; the drop releases the device
/// residency (the weights are freed with the guard) and logs the release.
pub struct ScopedModel {
    key: ModelKey,
    device: Device,
    model: LoadedModel,
}

impl ScopedModel {
    /// Bind loaded weights to their registry key and device.
    #[must_use]
    pub fn new(key: ModelKey, device: Device, model: LoadedModel) -> Self {
        tracing::debug!(model_key = %key, kind = %model.kind(), "model bound to device");
        Self { key, device, model }
    }

    /// The loaded weights.
    #[must_use]
    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    /// Kind tag of the loaded weights.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// The device the weights are resident on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Drop for ScopedModel {
    fn drop(&mut self) {
        tracing::debug!(model_key = %self.key, "releasing device-bound model");
    }
}

/// Model-registry collaborator.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Configs matching the descriptor's name, base, and kind.
    async fn search(&self, descriptor: &ModelDescriptor) -> ReduxResult<Vec<ModelConfigRecord>>;

    /// Load the model behind `key` onto `device`, returning the scoped guard.
    async fn load(&self, key: &ModelKey, device: &Device) -> ReduxResult<ScopedModel>;

    /// Directory of the locally cached artifacts for a record (weights,
    /// processor config).
    fn local_path(&self, record: &ModelConfigRecord) -> ReduxResult<PathBuf>;
}

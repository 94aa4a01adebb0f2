//! Redux projector: a small learned mapping from SigLIP embedding space to
//! the FLUX conditioning space.
//!
//! Two linear layers with a silu between them, matching the reference
//! weight layout (`redux_up`, `redux_down`).

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use flux_redux_core::{ReduxError, ReduxResult};
use std::path::Path;

/// Embedding width produced by the SigLIP so400m encoder.
pub const REDUX_DIM: usize = 1152;
/// Conditioning width consumed by the FLUX text stream.
pub const TXT_IN_FEATURES: usize = 4096;

/// The Redux projection model.
#[derive(Debug)]
pub struct ReduxProjector {
    redux_up: Linear,
    redux_down: Linear,
    dtype: DType,
}

impl ReduxProjector {
    /// Build the projector with the reference dimensions from a weight
    /// source.
    pub fn new(vb: VarBuilder) -> ReduxResult<Self> {
        Self::with_dims(REDUX_DIM, TXT_IN_FEATURES, vb)
    }

    /// Build a projector with explicit dimensions. The hidden expansion is
    /// `3 * txt_in_features`, as in the reference weights.
    pub fn with_dims(redux_dim: usize, txt_in_features: usize, vb: VarBuilder) -> ReduxResult<Self> {
        let dtype = vb.dtype();
        let redux_up = linear(redux_dim, txt_in_features * 3, vb.pp("redux_up"))?;
        let redux_down = linear(txt_in_features * 3, txt_in_features, vb.pp("redux_down"))?;
        Ok(Self {
            redux_up,
            redux_down,
            dtype,
        })
    }

    /// Assemble a projector from pre-built layers.
    #[must_use]
    pub fn from_parts(redux_up: Linear, redux_down: Linear, dtype: DType) -> Self {
        Self {
            redux_up,
            redux_down,
            dtype,
        }
    }

    /// Load projector weights from a safetensors file.
    pub fn load(path: &Path, device: &Device, dtype: DType) -> ReduxResult<Self> {
        if !path.exists() {
            return Err(ReduxError::ModelLoad {
                name: "redux".to_string(),
                reason: format!("safetensors not found at {}", path.display()),
            });
        }
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, device)? };
        Self::new(vb)
    }

    /// Parameter precision of the projector.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Map an embedding `(b, t, redux_dim)` to a conditioning tensor
    /// `(b, t, txt_in_features)`.
    ///
    /// The embedding is cast to the projector's parameter precision before
    /// application.
    pub fn project(&self, embedding: &Tensor) -> ReduxResult<Tensor> {
        let xs = embedding.to_dtype(self.dtype)?;
        let xs = self.redux_up.forward(&xs)?;
        let xs = candle_nn::ops::silu(&xs)?;
        Ok(self.redux_down.forward(&xs)?)
    }
}

//! Invocation request for the Redux conditioning node.

use flux_redux_core::{
    DownsampleMode, ImageHandle, ModelKey, ReduxResult, TensorHandle, TokenGridPolicy,
    TransformParams,
};
use serde::{Deserialize, Serialize};

fn default_factor() -> u32 {
    1
}

fn default_weight() -> f32 {
    1.0
}

/// One conditioning invocation.
///
/// The mask is an opaque reference aligned to the conditioning token grid;
/// it is passed through to the output untouched and never validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduxRequest {
    /// Source image to condition on.
    pub image: ImageHandle,
    /// Optional mask reference, passed through unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<TensorHandle>,
    /// Registry key of the Redux projector to apply.
    pub redux_model: ModelKey,
    /// Integer spatial reduction factor, 1-9.
    #[serde(default = "default_factor")]
    pub downsampling_factor: u32,
    /// Interpolation kernel used when the factor exceeds 1.
    #[serde(default)]
    pub downsampling_function: DownsampleMode,
    /// Conditioning weight in [0, 1], applied quadratically.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl ReduxRequest {
    /// Transform parameters of this request under the node's grid policy.
    #[must_use]
    pub fn transform_params(&self, policy: TokenGridPolicy) -> TransformParams {
        TransformParams {
            factor: self.downsampling_factor,
            mode: self.downsampling_function,
            weight: self.weight,
            policy,
        }
    }

    /// Range-check the request fields.
    pub fn validate(&self) -> ReduxResult<()> {
        self.transform_params(TokenGridPolicy::default()).validate()
    }
}

//! SigLIP vision tower configuration.

use flux_redux_core::ReduxResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Vision transformer hyperparameters.
///
/// Defaults are the so400m-patch14-384 checkpoint used by the Redux
/// conditioning path. Checkpoints ship the values in `config.json`, either
/// at the top level or under a `vision_config` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigLipVisionConfig {
    /// Transformer width.
    pub hidden_size: usize,
    /// MLP expansion width.
    pub intermediate_size: usize,
    /// Number of encoder layers.
    pub num_hidden_layers: usize,
    /// Attention heads per layer.
    pub num_attention_heads: usize,
    /// Input channels.
    pub num_channels: usize,
    /// Square input resolution in pixels.
    pub image_size: usize,
    /// Square patch side in pixels.
    pub patch_size: usize,
    /// Layer-norm epsilon.
    pub layer_norm_eps: f64,
}

impl Default for SigLipVisionConfig {
    fn default() -> Self {
        // google/siglip-so400m-patch14-384
        Self {
            hidden_size: 1152,
            intermediate_size: 4304,
            num_hidden_layers: 27,
            num_attention_heads: 16,
            num_channels: 3,
            image_size: 384,
            patch_size: 14,
            layer_norm_eps: 1e-6,
        }
    }
}

impl SigLipVisionConfig {
    /// Patches per side of the token grid.
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.image_size / self.patch_size
    }

    /// Token count of the encoder output (a perfect square by
    /// construction).
    #[must_use]
    pub fn num_patches(&self) -> usize {
        self.grid_size() * self.grid_size()
    }

    /// Per-head width.
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// Read a checkpoint `config.json`, accepting either a bare vision
    /// config or a combined config with a `vision_config` section.
    pub fn from_file(path: &Path) -> ReduxResult<Self> {
        let raw: serde_json::Value = serde_json::from_reader(std::fs::File::open(path)?)
            .map_err(|e| flux_redux_core::ReduxError::ModelLoad {
                name: "siglip".to_string(),
                reason: format!("cannot parse {}: {e}", path.display()),
            })?;
        let section = raw.get("vision_config").cloned().unwrap_or(raw);
        serde_json::from_value(section).map_err(|e| flux_redux_core::ReduxError::ModelLoad {
            name: "siglip".to_string(),
            reason: format!("invalid vision config in {}: {e}", path.display()),
        })
    }
}

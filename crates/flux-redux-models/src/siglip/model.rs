//! SigLIP vision transformer built on candle.
//!
//! Weight names follow the HuggingFace checkpoint layout
//! (`vision_model.embeddings.*`, `vision_model.encoder.layers.{i}.*`,
//! `vision_model.post_layernorm`). The forward pass returns the last hidden
//! state; SigLIP's pooling head is not part of the Redux path.

use super::config::SigLipVisionConfig;
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{
    conv2d, layer_norm, linear, Conv2d, Conv2dConfig, LayerNorm, Linear, VarBuilder,
};
use flux_redux_core::{ReduxError, ReduxResult};
use std::path::Path;

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Debug)]
struct VisionEmbeddings {
    patch_embedding: Conv2d,
    /// Learned position table, stored pre-unsqueezed as `(1, t, h)`.
    position_embedding: Tensor,
}

impl VisionEmbeddings {
    fn new(cfg: &SigLipVisionConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let conv_cfg = Conv2dConfig {
            stride: cfg.patch_size,
            ..Default::default()
        };
        let patch_embedding = conv2d(
            cfg.num_channels,
            cfg.hidden_size,
            cfg.patch_size,
            conv_cfg,
            vb.pp("patch_embedding"),
        )?;
        let position_embedding = vb
            .pp("position_embedding")
            .get((cfg.num_patches(), cfg.hidden_size), "weight")?
            .unsqueeze(0)?;
        Ok(Self {
            patch_embedding,
            position_embedding,
        })
    }

    fn forward(&self, pixel_values: &Tensor) -> candle_core::Result<Tensor> {
        // (b, 3, s, s) -> (b, h, g, g) -> (b, g*g, h)
        let xs = self.patch_embedding.forward(pixel_values)?;
        let xs = xs.flatten_from(2)?.transpose(1, 2)?.contiguous()?;
        xs.broadcast_add(&self.position_embedding)
    }
}

#[derive(Debug)]
struct Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl Attention {
    fn new(cfg: &SigLipVisionConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let h = cfg.hidden_size;
        Ok(Self {
            q_proj: linear(h, h, vb.pp("q_proj"))?,
            k_proj: linear(h, h, vb.pp("k_proj"))?,
            v_proj: linear(h, h, vb.pp("v_proj"))?,
            out_proj: linear(h, h, vb.pp("out_proj"))?,
            num_heads: cfg.num_attention_heads,
            head_dim: cfg.head_dim(),
            scale: (cfg.head_dim() as f64).powf(-0.5),
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let split = |xs: Tensor| -> candle_core::Result<Tensor> {
            xs.reshape((b, t, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(self.q_proj.forward(xs)?)?;
        let k = split(self.k_proj.forward(xs)?)?;
        let v = split(self.v_proj.forward(xs)?)?;

        let attn = (q.matmul(&k.transpose(D::Minus2, D::Minus1)?.contiguous()?)? * self.scale)?;
        let attn = candle_nn::ops::softmax_last_dim(&attn)?;
        let out = attn
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, self.num_heads * self.head_dim))?;
        self.out_proj.forward(&out)
    }
}

#[derive(Debug)]
struct Mlp {
    fc1: Linear,
    fc2: Linear,
}

impl Mlp {
    fn new(cfg: &SigLipVisionConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            fc1: linear(cfg.hidden_size, cfg.intermediate_size, vb.pp("fc1"))?,
            fc2: linear(cfg.intermediate_size, cfg.hidden_size, vb.pp("fc2"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // gelu_pytorch_tanh, candle's default gelu.
        self.fc2.forward(&self.fc1.forward(xs)?.gelu()?)
    }
}

#[derive(Debug)]
struct EncoderLayer {
    layer_norm1: LayerNorm,
    self_attn: Attention,
    layer_norm2: LayerNorm,
    mlp: Mlp,
}

impl EncoderLayer {
    fn new(cfg: &SigLipVisionConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            layer_norm1: layer_norm(cfg.hidden_size, cfg.layer_norm_eps, vb.pp("layer_norm1"))?,
            self_attn: Attention::new(cfg, vb.pp("self_attn"))?,
            layer_norm2: layer_norm(cfg.hidden_size, cfg.layer_norm_eps, vb.pp("layer_norm2"))?,
            mlp: Mlp::new(cfg, vb.pp("mlp"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = (xs + self.self_attn.forward(&self.layer_norm1.forward(xs)?)?)?;
        &xs + self.mlp.forward(&self.layer_norm2.forward(&xs)?)?
    }
}

/// SigLIP vision encoder.
#[derive(Debug)]
pub struct SigLipVisionModel {
    embeddings: VisionEmbeddings,
    layers: Vec<EncoderLayer>,
    post_layernorm: LayerNorm,
    config: SigLipVisionConfig,
}

impl SigLipVisionModel {
    /// Build the tower from a weight source rooted at the vision model
    /// (i.e. `embeddings`, `encoder`, `post_layernorm` live directly under
    /// `vb`).
    pub fn new(config: &SigLipVisionConfig, vb: VarBuilder) -> ReduxResult<Self> {
        let embeddings = VisionEmbeddings::new(config, vb.pp("embeddings"))?;
        let vb_layers = vb.pp("encoder").pp("layers");
        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        for i in 0..config.num_hidden_layers {
            layers.push(EncoderLayer::new(config, vb_layers.pp(i))?);
        }
        let post_layernorm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            vb.pp("post_layernorm"),
        )?;
        Ok(Self {
            embeddings,
            layers,
            post_layernorm,
            config: config.clone(),
        })
    }

    /// Load a locally cached checkpoint directory.
    ///
    /// Expects `model.safetensors` with HuggingFace `vision_model.*` keys;
    /// a missing `config.json` falls back to the so400m defaults.
    pub fn load(dir: &Path, device: &Device, dtype: DType) -> ReduxResult<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            SigLipVisionConfig::from_file(&config_path)?
        } else {
            tracing::debug!(dir = %dir.display(), "no config.json, using so400m defaults");
            SigLipVisionConfig::default()
        };

        let weights_path = dir.join(WEIGHTS_FILE);
        if !weights_path.exists() {
            return Err(ReduxError::ModelLoad {
                name: "siglip".to_string(),
                reason: format!("safetensors not found at {}", weights_path.display()),
            });
        }
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights_path], dtype, device)? };
        Self::new(&config, vb.pp("vision_model"))
    }

    /// The tower's configuration.
    #[must_use]
    pub fn config(&self) -> &SigLipVisionConfig {
        &self.config
    }

    /// Encode preprocessed pixels `(b, 3, s, s)` into the last hidden state
    /// `(b, tokens, hidden)`.
    pub fn forward(&self, pixel_values: &Tensor) -> ReduxResult<Tensor> {
        let mut xs = self.embeddings.forward(pixel_values)?;
        for layer in &self.layers {
            xs = layer.forward(&xs)?;
        }
        Ok(self.post_layernorm.forward(&xs)?)
    }
}

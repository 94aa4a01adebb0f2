//! Spatial downsampling and weighting of the projected conditioning tensor.
//!
//! Pure numeric stage, no model resource involved. Tokens are reshaped into
//! an `m x m` spatial grid (`m = floor(sqrt(t))`), optionally resampled down
//! by an integer factor with one of five interpolation kernels, flattened
//! back to token form, and optionally scaled by `weight^2`. The quadratic
//! scaling matches the reference perceptual weighting of the upstream
//! technique this reproduces.
//!
//! Kernel semantics follow `torch.nn.functional.interpolate` with
//! `align_corners=False` and no antialiasing; see [`kernels`] for the exact
//! index math.

mod kernels;


use crate::error::{ReduxError, ReduxResult};
use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};

/// Interpolation kernel used when reducing the spatial token grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownsampleMode {
    /// Pick the source sample at `floor(dst * scale)`.
    #[serde(rename = "nearest")]
    Nearest,
    /// 2x2 taps with half-pixel coordinates.
    #[serde(rename = "bilinear")]
    Bilinear,
    /// 4x4 cubic convolution, `a = -0.75`.
    #[serde(rename = "bicubic")]
    Bicubic,
    /// Adaptive average pooling (exact block mean for divisible sizes).
    #[default]
    #[serde(rename = "area")]
    Area,
    /// Pick the source sample at `floor((dst + 0.5) * scale)`.
    #[serde(rename = "nearest-exact")]
    NearestExact,
}

impl DownsampleMode {
    /// All kernels, for exhaustive property tests.
    #[must_use]
    pub fn all() -> &'static [DownsampleMode] {
        &[
            DownsampleMode::Nearest,
            DownsampleMode::Bilinear,
            DownsampleMode::Bicubic,
            DownsampleMode::Area,
            DownsampleMode::NearestExact,
        ]
    }
}

/// What to do when the token count is not a perfect square.
///
/// The reference implementation silently drops the excess tokens during the
/// grid reshape. That is a known gap, not a feature: the strict policy turns
/// it into an explicit error, and `LegacyTruncate` reproduces the original
/// behavior for byte-compatible output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenGridPolicy {
    /// Raise [`ReduxError::NonSquareTokenGrid`] when `m*m != t`.
    #[default]
    Strict,
    /// Silently drop tokens beyond `m*m`, as the reference does.
    LegacyTruncate,
}

/// Parameters of one transform application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Integer spatial reduction factor, 1-9. 1 means no resampling.
    pub factor: u32,
    /// Interpolation kernel used when `factor > 1`.
    pub mode: DownsampleMode,
    /// Conditioning weight in [0, 1]; applied as `weight^2`.
    pub weight: f32,
    /// Non-square token grid handling.
    pub policy: TokenGridPolicy,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            factor: 1,
            mode: DownsampleMode::Area,
            weight: 1.0,
            policy: TokenGridPolicy::Strict,
        }
    }
}

impl TransformParams {
    /// Whether this parameter set leaves the tensor untouched.
    ///
    /// The orchestrator skips the stage entirely in that case, so the
    /// projector output flows through bit-identical.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.factor <= 1 && self.weight == 1.0
    }

    /// Range-check the parameters.
    pub fn validate(&self) -> ReduxResult<()> {
        if !(1..=9).contains(&self.factor) {
            return Err(ReduxError::InvalidParameter {
                name: "downsampling_factor",
                value: self.factor.to_string(),
                expected: "an integer in [1, 9]",
            });
        }
        if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
            return Err(ReduxError::InvalidParameter {
                name: "weight",
                value: self.weight.to_string(),
                expected: "a float in [0.0, 1.0]",
            });
        }
        Ok(())
    }
}

/// Largest `m` with `m * m <= t`.
fn grid_side(tokens: usize) -> usize {
    let mut m = (tokens as f64).sqrt() as usize;
    while (m + 1) * (m + 1) <= tokens {
        m += 1;
    }
    while m * m > tokens {
        m -= 1;
    }
    m
}

/// Apply the spatial-compression/weighting transform to a `(b, t, h)`
/// conditioning tensor.
///
/// The computation runs in f32 on the CPU; dtype and device of the input are
/// restored on the result. Identity parameters return the input unchanged.
///
/// # Errors
///
/// - [`ReduxError::InvalidParameter`] if the factor or weight is out of range
/// - [`ReduxError::NonSquareTokenGrid`] if `factor > 1`, the token count is
///   not a perfect square, and the policy is [`TokenGridPolicy::Strict`]
pub fn downsample_and_weight(conditioning: &Tensor, params: &TransformParams) -> ReduxResult<Tensor> {
    params.validate()?;
    if params.is_identity() {
        return Ok(conditioning.clone());
    }

    let (b, t, h) = conditioning.dims3()?;
    let dtype = conditioning.dtype();
    let device = conditioning.device().clone();

    let data = conditioning
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .flatten_all()?
        .to_vec1::<f32>()?;

    let factor = params.factor as usize;
    let (mut out, t_out) = if factor > 1 {
        let m = grid_side(t);
        if m * m != t {
            match params.policy {
                TokenGridPolicy::Strict => {
                    return Err(ReduxError::NonSquareTokenGrid { tokens: t });
                }
                TokenGridPolicy::LegacyTruncate => {
                    tracing::warn!(
                        tokens = t,
                        grid = m,
                        "token count is not a perfect square; dropping {} trailing tokens",
                        t - m * m
                    );
                }
            }
        }
        let out_m = m / factor;
        let mut resampled = Vec::with_capacity(b * out_m * out_m * h);
        for bi in 0..b {
            let batch = &data[bi * t * h..bi * t * h + m * m * h];
            resampled.extend(kernels::resample(batch, m, h, out_m, params.mode));
        }
        (resampled, out_m * out_m)
    } else {
        (data, t)
    };

    if params.weight != 1.0 {
        let w2 = params.weight * params.weight;
        for v in &mut out {
            *v *= w2;
        }
    }

    let result = Tensor::from_vec(out, (b, t_out, h), &Device::Cpu)?
        .to_dtype(dtype)?
        .to_device(&device)?;
    Ok(result)
}

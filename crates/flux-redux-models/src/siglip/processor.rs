//! Image preprocessing for the SigLIP encoder.
//!
//! Resize to the model resolution (bicubic), rescale to [0, 1], normalize
//! to roughly [-1, 1] with mean/std 0.5 per channel, and emit an NCHW
//! tensor.

use candle_core::{DType, Device, Tensor};
use flux_redux_core::ReduxResult;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Deserialize;
use std::path::Path;

const PROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

#[derive(Debug, Default, Deserialize)]
struct RawSize {
    height: Option<u32>,
    width: Option<u32>,
}

/// Subset of the checkpoint's `preprocessor_config.json` we honor.
#[derive(Debug, Default, Deserialize)]
struct RawProcessorConfig {
    size: Option<RawSize>,
    rescale_factor: Option<f32>,
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
}

/// SigLIP image processor.
#[derive(Debug, Clone, PartialEq)]
pub struct SigLipImageProcessor {
    image_size: u32,
    rescale_factor: f32,
    image_mean: [f32; 3],
    image_std: [f32; 3],
}

impl Default for SigLipImageProcessor {
    fn default() -> Self {
        Self {
            image_size: 384,
            rescale_factor: 1.0 / 255.0,
            image_mean: [0.5; 3],
            image_std: [0.5; 3],
        }
    }
}

impl SigLipImageProcessor {
    /// Processor with an explicit target resolution.
    #[must_use]
    pub fn with_image_size(image_size: u32) -> Self {
        Self {
            image_size,
            ..Self::default()
        }
    }

    /// Load processor settings from a locally cached model directory.
    ///
    /// Reads `preprocessor_config.json` when present; absent fields (or an
    /// absent file) fall back to the so400m defaults.
    pub fn from_dir(dir: &Path) -> ReduxResult<Self> {
        let path = dir.join(PROCESSOR_CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(dir = %dir.display(), "no preprocessor config, using defaults");
            return Ok(Self::default());
        }
        let raw: RawProcessorConfig = serde_json::from_reader(std::fs::File::open(&path)?)
            .map_err(|e| flux_redux_core::ReduxError::ModelLoad {
                name: "siglip".to_string(),
                reason: format!("cannot parse {}: {e}", path.display()),
            })?;

        let defaults = Self::default();
        let image_size = raw
            .size
            .and_then(|s| s.height.or(s.width))
            .unwrap_or(defaults.image_size);
        Ok(Self {
            image_size,
            rescale_factor: raw.rescale_factor.unwrap_or(defaults.rescale_factor),
            image_mean: raw.image_mean.unwrap_or(defaults.image_mean),
            image_std: raw.image_std.unwrap_or(defaults.image_std),
        })
    }

    /// Target square resolution in pixels.
    #[must_use]
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Turn an RGB image into a `(1, 3, size, size)` pixel tensor on the
    /// target device and precision.
    pub fn preprocess(
        &self,
        image: &DynamicImage,
        device: &Device,
        dtype: DType,
    ) -> ReduxResult<Tensor> {
        let size = self.image_size;
        let resized = image
            .resize_exact(size, size, FilterType::CatmullRom)
            .to_rgb8();

        let side = size as usize;
        let plane = side * side;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let idx = y as usize * side + x as usize;
            for c in 0..3 {
                data[c * plane + idx] =
                    (pixel[c] as f32 * self.rescale_factor - self.image_mean[c])
                        / self.image_std[c];
            }
        }

        let tensor = Tensor::from_vec(data, (1, 3, side, side), &Device::Cpu)?
            .to_dtype(dtype)?
            .to_device(device)?;
        Ok(tensor)
    }
}

//! SigLIP vision pipeline: image preprocessing plus the vision transformer.
//!
//! Produces the `(1, t, h)` embedding consumed by the Redux projector; the
//! so400m-patch14-384 checkpoint yields `t = 729`, `h = 1152`.

mod config;
mod model;
mod processor;


pub use config::SigLipVisionConfig;
pub use model::SigLipVisionModel;
pub use processor::SigLipImageProcessor;

use candle_core::{DType, Device, Tensor};
use flux_redux_core::ReduxResult;
use image::DynamicImage;

/// Processor and encoder paired for one encode call.
///
/// The model is borrowed from the scoped registry guard, so the pipeline
/// lives no longer than the guard that owns the weights.
pub struct SigLipPipeline<'a> {
    processor: SigLipImageProcessor,
    model: &'a SigLipVisionModel,
}

impl<'a> SigLipPipeline<'a> {
    /// Pair a processor with borrowed encoder weights.
    #[must_use]
    pub fn new(processor: SigLipImageProcessor, model: &'a SigLipVisionModel) -> Self {
        Self { processor, model }
    }

    /// Encode an RGB image into a `(1, tokens, hidden)` embedding on the
    /// target device and precision.
    pub fn encode_image(
        &self,
        image: &DynamicImage,
        device: &Device,
        dtype: DType,
    ) -> ReduxResult<Tensor> {
        let pixel_values = self.processor.preprocess(image, device, dtype)?;
        self.model.forward(&pixel_values)
    }
}

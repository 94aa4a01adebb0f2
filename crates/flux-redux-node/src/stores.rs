//! Persistence collaborator traits.
//!
//! Image and tensor storage live outside this crate; the pipeline only
//! needs to fetch one source image and persist one conditioning tensor per
//! invocation.

use async_trait::async_trait;
use candle_core::Tensor;
use flux_redux_core::{ImageHandle, ReduxResult, TensorHandle};
use image::DynamicImage;

/// Read side of the image store.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the image behind `handle` as RGB.
    async fn get_rgb(&self, handle: &ImageHandle) -> ReduxResult<DynamicImage>;
}

/// Write side of the tensor store.
#[async_trait]
pub trait TensorStore: Send + Sync {
    /// Persist a conditioning tensor, returning its new handle.
    async fn save(&self, tensor: &Tensor) -> ReduxResult<TensorHandle>;
}

//! The conditioning pipeline: encode, project, transform, persist.
//!
//! Every collaborator is injected at construction, so the pipeline carries
//! no ambient context and no mutable state across invocations. Model
//! weights are held through the registry's scoped guard for exactly one
//! stage at a time; the guard drops on every exit path.

use crate::config::NodeConfig;
use crate::request::ReduxRequest;
use crate::stores::{ImageStore, TensorStore};
use candle_core::{DType, Device, Tensor};
use flux_redux_core::{
    downsample_and_weight, siglip_starter, ReduxConditioning, ReduxResult,
};
use flux_redux_models::installer::{CancelToken, ModelInstaller};
use flux_redux_models::registry::ModelRegistry;
use flux_redux_models::resolver::{ModelResolver, ResolverConfig};
use flux_redux_models::siglip::{SigLipImageProcessor, SigLipPipeline};
use flux_redux_models::{preferred_device, preferred_dtype};
use image::DynamicImage;
use std::sync::Arc;

/// Orchestrates one Redux conditioning invocation.
pub struct FluxReduxPipeline {
    images: Arc<dyn ImageStore>,
    tensors: Arc<dyn TensorStore>,
    registry: Arc<dyn ModelRegistry>,
    resolver: ModelResolver,
    config: NodeConfig,
}

impl FluxReduxPipeline {
    /// Wire the pipeline to its collaborators.
    pub fn new(
        images: Arc<dyn ImageStore>,
        tensors: Arc<dyn TensorStore>,
        registry: Arc<dyn ModelRegistry>,
        installer: Arc<dyn ModelInstaller>,
        config: NodeConfig,
    ) -> ReduxResult<Self> {
        config.validate()?;
        let resolver = ModelResolver::new(
            Arc::clone(&registry),
            installer,
            ResolverConfig {
                install_timeout: config.install_timeout(),
            },
        );
        Ok(Self {
            images,
            tensors,
            registry,
            resolver,
            config,
        })
    }

    /// Run one invocation to completion.
    ///
    /// The returned record references the persisted conditioning tensor and
    /// carries the request's mask reference unmodified.
    #[tracing::instrument(skip_all, fields(image = %request.image, redux_model = %request.redux_model))]
    pub async fn run(
        &self,
        request: &ReduxRequest,
        cancel: &CancelToken,
    ) -> ReduxResult<ReduxConditioning> {
        request.validate()?;

        let image = self.images.get_rgb(&request.image).await?;
        let device = preferred_device();
        let dtype = preferred_dtype(&device);

        let embedding = self.encode(&image, &device, dtype, cancel).await?;
        tracing::debug!(shape = ?embedding.dims(), "image encoded");

        let conditioning = self.project(&embedding, request, &device).await?;
        tracing::debug!(shape = ?conditioning.dims(), "conditioning projected");

        let params = request.transform_params(self.config.token_grid_policy);
        // Identity parameters skip the stage so the projector output flows
        // through bit-identical.
        let conditioning = if params.is_identity() {
            conditioning
        } else {
            let transformed = downsample_and_weight(&conditioning, &params)?;
            tracing::debug!(
                factor = params.factor,
                weight = params.weight,
                shape = ?transformed.dims(),
                "conditioning transformed"
            );
            transformed
        };

        let tensor = self.tensors.save(&conditioning).await?;
        tracing::info!(tensor = %tensor, "conditioning persisted");
        Ok(ReduxConditioning {
            tensor,
            mask: request.mask.clone(),
        })
    }

    /// Resolve, load, and run the vision encoder; the weights guard lives
    /// only for this stage.
    async fn encode(
        &self,
        image: &DynamicImage,
        device: &Device,
        dtype: DType,
        cancel: &CancelToken,
    ) -> ReduxResult<Tensor> {
        let record = self.resolver.resolve(&siglip_starter(), cancel).await?;
        let assets = self.registry.local_path(&record)?;
        let guard = self.registry.load(&record.key, device).await?;
        let model = guard.model().as_siglip()?;
        let processor = SigLipImageProcessor::from_dir(&assets)?;
        SigLipPipeline::new(processor, model).encode_image(image, device, dtype)
    }

    /// Load and apply the caller-selected Redux projector; no resolution,
    /// the key comes straight from the request.
    async fn project(
        &self,
        embedding: &Tensor,
        request: &ReduxRequest,
        device: &Device,
    ) -> ReduxResult<Tensor> {
        let guard = self.registry.load(&request.redux_model, device).await?;
        guard.model().as_redux()?.project(embedding)
    }
}

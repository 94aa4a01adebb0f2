//! End-to-end pipeline runs against in-memory stores and a scripted
//! registry/installer pair, with a one-layer encoder small enough for unit
//! tests (2x2 token grid, width 16, projecting to width 8).

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use flux_redux_core::{
    siglip_starter, ConfigOverrides, DownsampleMode, ImageHandle, InstallJob, ModelConfigRecord,
    ModelDescriptor, ModelKey, ModelSource, ReduxError, ReduxResult, TensorHandle,
};
use flux_redux_models::{
    CancelToken, InstallOutcome, LoadedModel, ModelInstaller, ModelRegistry, ReduxProjector,
    ScopedModel, SigLipImageProcessor, SigLipPipeline, SigLipVisionConfig, SigLipVisionModel,
};
use flux_redux_node::{FluxReduxPipeline, ImageStore, NodeConfig, ReduxRequest, TensorStore};
use image::{DynamicImage, Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SIGLIP_KEY: &str = "siglip-key";
const REDUX_KEY: &str = "redux-key";
const IMAGE_SIZE: usize = 28;
const REDUX_DIM: usize = 16;
const TXT_IN: usize = 8;

fn tiny_config() -> SigLipVisionConfig {
    SigLipVisionConfig {
        hidden_size: REDUX_DIM,
        intermediate_size: 32,
        num_hidden_layers: 1,
        num_attention_heads: 2,
        num_channels: 3,
        image_size: IMAGE_SIZE,
        patch_size: 14,
        layer_norm_eps: 1e-6,
    }
}

fn test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(40, 40, |x, y| {
        Rgb([(x * 6) as u8, (y * 6) as u8, 128])
    }))
}

fn siglip_record() -> ModelConfigRecord {
    let starter = siglip_starter();
    ModelConfigRecord {
        key: ModelKey::new(SIGLIP_KEY),
        name: starter.descriptor.name,
        base: starter.descriptor.base,
        kind: starter.descriptor.kind,
        source: starter.source,
    }
}

// ==================== Fakes ====================

struct MemoryImageStore {
    images: Mutex<HashMap<ImageHandle, DynamicImage>>,
}

impl MemoryImageStore {
    fn with_image(handle: &str, image: DynamicImage) -> Arc<Self> {
        let mut images = HashMap::new();
        images.insert(ImageHandle::new(handle), image);
        Arc::new(Self {
            images: Mutex::new(images),
        })
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn get_rgb(&self, handle: &ImageHandle) -> ReduxResult<DynamicImage> {
        self.images
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| ReduxError::Store {
                reason: format!("no image {handle}"),
            })
    }
}

#[derive(Default)]
struct MemoryTensorStore {
    saved: Mutex<Vec<Tensor>>,
}

impl MemoryTensorStore {
    fn saved(&self) -> Vec<Tensor> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl TensorStore for MemoryTensorStore {
    async fn save(&self, tensor: &Tensor) -> ReduxResult<TensorHandle> {
        let mut saved = self.saved.lock();
        saved.push(tensor.clone());
        Ok(TensorHandle::new(format!("tensor-{}", saved.len())))
    }
}

/// Registry whose weights live in shared var maps, so every load of the
/// same key rebuilds identical models.
struct FakeRegistry {
    records: Mutex<Vec<ModelConfigRecord>>,
    siglip_vars: VarMap,
    redux_vars: VarMap,
    config: SigLipVisionConfig,
    /// Holds the processor config for `local_path`.
    assets: tempfile::TempDir,
}

impl FakeRegistry {
    fn new(records: Vec<ModelConfigRecord>) -> Arc<Self> {
        let assets = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(assets.path().join("preprocessor_config.json")).unwrap();
        write!(f, r#"{{"size": {{"height": {IMAGE_SIZE}, "width": {IMAGE_SIZE}}}}}"#).unwrap();

        Arc::new(Self {
            records: Mutex::new(records),
            siglip_vars: VarMap::new(),
            redux_vars: VarMap::new(),
            config: tiny_config(),
            assets,
        })
    }

    fn siglip_model(&self, device: &Device) -> ReduxResult<SigLipVisionModel> {
        let vb = VarBuilder::from_varmap(&self.siglip_vars, DType::F32, device);
        SigLipVisionModel::new(&self.config, vb)
    }

    fn redux_model(&self, device: &Device) -> ReduxResult<ReduxProjector> {
        let vb = VarBuilder::from_varmap(&self.redux_vars, DType::F32, device);
        ReduxProjector::with_dims(REDUX_DIM, TXT_IN, vb)
    }
}

#[async_trait]
impl ModelRegistry for FakeRegistry {
    async fn search(&self, descriptor: &ModelDescriptor) -> ReduxResult<Vec<ModelConfigRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.matches(descriptor))
            .cloned()
            .collect())
    }

    async fn load(&self, key: &ModelKey, device: &Device) -> ReduxResult<ScopedModel> {
        let model = match key.as_str() {
            SIGLIP_KEY => LoadedModel::SigLip(Box::new(self.siglip_model(device)?)),
            REDUX_KEY => LoadedModel::Redux(Box::new(self.redux_model(device)?)),
            other => {
                return Err(ReduxError::Store {
                    reason: format!("no model {other}"),
                })
            }
        };
        Ok(ScopedModel::new(key.clone(), device.clone(), model))
    }

    fn local_path(&self, _record: &ModelConfigRecord) -> ReduxResult<PathBuf> {
        Ok(self.assets.path().to_path_buf())
    }
}

enum InstallScript {
    RegisterSigLip,
    TimeOut,
}

struct FakeInstaller {
    registry: Arc<FakeRegistry>,
    script: InstallScript,
    imports: AtomicUsize,
}

impl FakeInstaller {
    fn new(registry: Arc<FakeRegistry>, script: InstallScript) -> Arc<Self> {
        Arc::new(Self {
            registry,
            script,
            imports: AtomicUsize::new(0),
        })
    }

    fn import_count(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInstaller for FakeInstaller {
    async fn heuristic_import(
        &self,
        _source: &ModelSource,
        _overrides: &ConfigOverrides,
    ) -> ReduxResult<InstallJob> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        Ok(InstallJob::new())
    }

    async fn wait_for_job(
        &self,
        _job: &InstallJob,
        _timeout: Duration,
    ) -> ReduxResult<InstallOutcome> {
        match self.script {
            InstallScript::RegisterSigLip => {
                self.registry.records.lock().push(siglip_record());
                Ok(InstallOutcome::Completed)
            }
            InstallScript::TimeOut => Ok(InstallOutcome::TimedOut),
        }
    }
}

// ==================== Harness ====================

struct Harness {
    tensors: Arc<MemoryTensorStore>,
    registry: Arc<FakeRegistry>,
    installer: Arc<FakeInstaller>,
    pipeline: FluxReduxPipeline,
}

impl Harness {
    fn new(preinstalled: bool, script: InstallScript, config: NodeConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let records = if preinstalled {
            vec![siglip_record()]
        } else {
            Vec::new()
        };
        let images = MemoryImageStore::with_image("img-1", test_image());
        let tensors = Arc::new(MemoryTensorStore::default());
        let registry = FakeRegistry::new(records);
        let installer = FakeInstaller::new(Arc::clone(&registry), script);
        let pipeline = FluxReduxPipeline::new(
            images,
            Arc::clone(&tensors) as Arc<dyn TensorStore>,
            Arc::clone(&registry) as Arc<dyn ModelRegistry>,
            Arc::clone(&installer) as Arc<dyn ModelInstaller>,
            config,
        )
        .unwrap();
        Self {
            tensors,
            registry,
            installer,
            pipeline,
        }
    }

    fn installed() -> Self {
        Self::new(true, InstallScript::RegisterSigLip, NodeConfig::default())
    }

    async fn run(&self, request: &ReduxRequest) -> ReduxResult<flux_redux_core::ReduxConditioning> {
        self.pipeline.run(request, &CancelToken::new()).await
    }
}

fn request() -> ReduxRequest {
    ReduxRequest {
        image: ImageHandle::new("img-1"),
        mask: None,
        redux_model: ModelKey::new(REDUX_KEY),
        downsampling_factor: 1,
        downsampling_function: DownsampleMode::Area,
        weight: 1.0,
    }
}

fn flat(tensor: &Tensor) -> Vec<f32> {
    tensor
        .flatten_all()
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap()
        .to_vec1::<f32>()
        .unwrap()
}

// ==================== Tests ====================

#[tokio::test]
async fn test_identity_run_persists_unmodified_projection() {
    let harness = Harness::installed();
    let output = harness.run(&request()).await.unwrap();

    assert_eq!(output.tensor, TensorHandle::new("tensor-1"));
    assert_eq!(output.mask, None);
    assert_eq!(harness.installer.import_count(), 0);

    let saved = harness.tensors.saved();
    assert_eq!(saved.len(), 1);
    // 2x2 token grid, projected width 8.
    assert_eq!(saved[0].dims3().unwrap(), (1, 4, TXT_IN));

    // Identity parameters skip the transform, so the stored tensor must be
    // bit-identical to encode + project on the same weights.
    let device = Device::Cpu;
    let model = harness.registry.siglip_model(&device).unwrap();
    let processor = SigLipImageProcessor::with_image_size(IMAGE_SIZE as u32);
    let embedding = SigLipPipeline::new(processor, &model)
        .encode_image(&test_image(), &device, DType::F32)
        .unwrap();
    let expected = harness
        .registry
        .redux_model(&device)
        .unwrap()
        .project(&embedding)
        .unwrap();
    assert_eq!(flat(&saved[0]), flat(&expected));
}

#[tokio::test]
async fn test_weight_scales_conditioning_quadratically() {
    let harness = Harness::installed();
    let identity = harness.run(&request()).await.unwrap();
    assert_eq!(identity.tensor, TensorHandle::new("tensor-1"));

    let mut weighted = request();
    weighted.weight = 0.5;
    harness.run(&weighted).await.unwrap();

    let saved = harness.tensors.saved();
    assert_eq!(saved.len(), 2);
    let raw = flat(&saved[0]);
    let scaled = flat(&saved[1]);
    assert_eq!(raw.len(), scaled.len());
    for (r, s) in raw.iter().zip(&scaled) {
        assert!((s - r * 0.25).abs() < 1e-6, "raw {r} scaled {s}");
    }
}

#[tokio::test]
async fn test_downsampling_reduces_the_token_grid() {
    let harness = Harness::installed();
    let mut req = request();
    req.downsampling_factor = 2;
    harness.run(&req).await.unwrap();

    let saved = harness.tensors.saved();
    // 2x2 grid reduced by 2 leaves a single token.
    assert_eq!(saved[0].dims3().unwrap(), (1, 1, TXT_IN));
}

#[tokio::test]
async fn test_mask_reference_passes_through_untouched() {
    let harness = Harness::installed();
    let mut req = request();
    req.mask = Some(TensorHandle::new("mask-9"));
    let output = harness.run(&req).await.unwrap();
    assert_eq!(output.mask, Some(TensorHandle::new("mask-9")));
}

#[tokio::test]
async fn test_missing_encoder_installs_then_runs() {
    let harness = Harness::new(false, InstallScript::RegisterSigLip, NodeConfig::default());
    let output = harness.run(&request()).await.unwrap();

    assert_eq!(output.tensor, TensorHandle::new("tensor-1"));
    assert_eq!(harness.installer.import_count(), 1);
}

#[tokio::test]
async fn test_install_timeout_aborts_before_any_store_write() {
    let harness = Harness::new(false, InstallScript::TimeOut, NodeConfig::default());
    let err = harness.run(&request()).await.unwrap_err();

    assert!(matches!(err, ReduxError::InstallTimeout { .. }));
    assert!(harness.tensors.saved().is_empty());
}

#[tokio::test]
async fn test_encoder_key_in_redux_slot_is_type_mismatch() {
    let harness = Harness::installed();
    let mut req = request();
    req.redux_model = ModelKey::new(SIGLIP_KEY);
    let err = harness.run(&req).await.unwrap_err();
    assert!(matches!(err, ReduxError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_unknown_image_handle_is_store_error() {
    let harness = Harness::installed();
    let mut req = request();
    req.image = ImageHandle::new("missing");
    let err = harness.run(&req).await.unwrap_err();
    assert!(matches!(err, ReduxError::Store { .. }));
}

#[tokio::test]
async fn test_invalid_factor_fails_before_any_work() {
    let harness = Harness::installed();
    let mut req = request();
    req.downsampling_factor = 0;
    let err = harness.run(&req).await.unwrap_err();

    assert!(matches!(
        err,
        ReduxError::InvalidParameter {
            name: "downsampling_factor",
            ..
        }
    ));
    assert!(harness.tensors.saved().is_empty());
}

#[tokio::test]
async fn test_zero_install_timeout_rejected_at_construction() {
    let images = MemoryImageStore::with_image("img-1", test_image());
    let tensors = Arc::new(MemoryTensorStore::default());
    let registry = FakeRegistry::new(Vec::new());
    let installer = FakeInstaller::new(Arc::clone(&registry), InstallScript::TimeOut);

    let err = FluxReduxPipeline::new(
        images,
        tensors,
        registry,
        installer,
        NodeConfig {
            install_timeout_secs: 0,
            ..NodeConfig::default()
        },
    )
    .err()
    .unwrap();
    assert!(matches!(err, ReduxError::InvalidParameter { .. }));
}

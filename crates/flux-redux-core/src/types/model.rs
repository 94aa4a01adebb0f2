//! Model descriptors, registry records, and installer types.
//!
//! The model kind is a closed tagged set carried by every registry record.
//! Pipeline stages check the tag before use and return
//! [`ReduxError::TypeMismatch`](crate::error::ReduxError::TypeMismatch)
//! instead of asserting on the loaded object's identity.

use super::handles::ModelKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Base model type a config is compatible with.
///
/// Auxiliary models used by this node are base-agnostic, so the set is
/// currently a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseKind {
    /// Compatible with any base model.
    Any,
}

/// Closed set of model kinds this pipeline can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// SigLIP-style vision encoder.
    #[serde(rename = "siglip")]
    SigLip,
    /// Redux projector mapping encoder embeddings to FLUX conditioning space.
    #[serde(rename = "redux")]
    Redux,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::SigLip => f.write_str("siglip"),
            ModelKind::Redux => f.write_str("redux"),
        }
    }
}

/// Identifies a model for registry lookup by name, base, and kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Registry name, e.g. `"SigLIP"`.
    pub name: String,
    /// Base compatibility tag.
    pub base: BaseKind,
    /// Model kind tag.
    pub kind: ModelKind,
}

/// Source descriptor the installer imports from, e.g. a hub repo id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSource(String);

impl ModelSource {
    /// Wrap a source string.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The underlying source string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registry row describing an installed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfigRecord {
    /// Registry key used for loading.
    pub key: ModelKey,
    /// Registry name.
    pub name: String,
    /// Base compatibility tag.
    pub base: BaseKind,
    /// Model kind tag.
    pub kind: ModelKind,
    /// Source the model was imported from.
    pub source: ModelSource,
}

impl ModelConfigRecord {
    /// Whether this record matches a lookup descriptor.
    #[must_use]
    pub fn matches(&self, descriptor: &ModelDescriptor) -> bool {
        self.name == descriptor.name && self.base == descriptor.base && self.kind == descriptor.kind
    }
}

/// Override record submitted alongside a heuristic import.
///
/// The installer's probe cannot reliably determine the kind of an auxiliary
/// model, so the caller pins the name and kind up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Name the imported config must be registered under.
    pub name: String,
    /// Kind tag the imported config must carry.
    pub kind: ModelKind,
}

/// Opaque handle for a submitted install job.
///
/// Completion is observed only through the installer's blocking wait call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallJob {
    /// Installer-assigned job id.
    pub id: Uuid,
}

impl InstallJob {
    /// Mint a fresh job handle.
    #[must_use]
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for InstallJob {
    fn default() -> Self {
        Self::new()
    }
}

/// A well-known model this node can install on demand: lookup descriptor
/// plus the source to import it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterModel {
    /// Descriptor used for registry lookup.
    pub descriptor: ModelDescriptor,
    /// Source the installer imports from when the lookup comes up empty.
    pub source: ModelSource,
}

/// The SigLIP encoder required by the Redux conditioning path.
#[must_use]
pub fn siglip_starter() -> StarterModel {
    StarterModel {
        descriptor: ModelDescriptor {
            name: "SigLIP".to_string(),
            base: BaseKind::Any,
            kind: ModelKind::SigLip,
        },
        source: ModelSource::new("google/siglip-so400m-patch14-384"),
    }
}

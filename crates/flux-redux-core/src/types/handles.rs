//! Opaque store references.
//!
//! The image store, tensor store, and model registry each address their
//! contents by name. These newtypes keep the three namespaces from being
//! confused with one another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an RGB image held by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

/// Opaque reference to a tensor persisted in the tensor store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorHandle(String);

/// Registry key identifying one installed model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelKey(String);

macro_rules! impl_handle {
    ($ty:ident) => {
        impl $ty {
            /// Wrap a store-assigned name.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// The underlying store name.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_handle!(ImageHandle);
impl_handle!(TensorHandle);
impl_handle!(ModelKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_round_trip_through_serde() {
        let handle = TensorHandle::new("tensor-42");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"tensor-42\"");
        let back: TensorHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn test_display_matches_inner_name() {
        assert_eq!(ImageHandle::new("img").to_string(), "img");
        assert_eq!(ModelKey::new("key-1").as_str(), "key-1");
    }
}

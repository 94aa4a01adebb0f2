//! The conditioning record produced by one invocation.

use super::handles::TensorHandle;
use serde::{Deserialize, Serialize};

/// Output of the Redux conditioning pipeline.
///
/// Bundles the persisted conditioning tensor with the caller's optional mask
/// reference. The mask marks included/excluded regions on the conditioning
/// token grid; it is carried through unmodified and never consumed by this
/// node, so downstream consumers must handle the absent case themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduxConditioning {
    /// Handle of the persisted conditioning tensor.
    pub tensor: TensorHandle,
    /// Optional mask reference, passed through from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<TensorHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_optional_in_serde() {
        let json = r#"{"tensor":"t-1"}"#;
        let cond: ReduxConditioning = serde_json::from_str(json).unwrap();
        assert_eq!(cond.tensor, TensorHandle::new("t-1"));
        assert!(cond.mask.is_none());
        assert_eq!(serde_json::to_string(&cond).unwrap(), json);
    }
}

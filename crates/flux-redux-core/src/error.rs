//! Error taxonomy for the FLUX Redux conditioning pipeline.
//!
//! | Category | Variants | Outcome |
//! |----------|----------|---------|
//! | Configuration | `ModelUnavailable`, `InstallTimeout`, `AmbiguousModel` | Fatal to the invocation |
//! | Type identity | `TypeMismatch` | Fatal; indicates registry/config corruption |
//! | Shape | `NonSquareTokenGrid` | Fatal under the strict token-grid policy |
//! | Validation | `InvalidParameter` | Fix the request |
//! | Infrastructure | `ModelLoad`, `InvalidImage`, `Store`, `Tensor`, `Image`, `Io` | Fatal |
//!
//! Every error aborts the whole invocation; there is no local recovery or
//! partial-result return. The install-and-wait path is attempted at most once.

use crate::types::ModelKind;
use thiserror::Error;

/// Error type for all conditioning-pipeline failures.
#[derive(Debug, Error)]
pub enum ReduxError {
    // === Configuration Errors ===
    /// Required auxiliary model unobtainable after the install attempt.
    #[error("Required model is not available: {name} ({kind})")]
    ModelUnavailable {
        /// Descriptor name of the missing model.
        name: String,
        /// Descriptor kind of the missing model.
        kind: ModelKind,
    },

    /// The install wait exceeded its bound and the model is still absent.
    #[error("Install of {name} did not complete within {timeout_secs}s")]
    InstallTimeout {
        /// Descriptor name of the model being installed.
        name: String,
        /// The wait bound that was exceeded.
        timeout_secs: u64,
    },

    /// More than one registry match where exactly one is expected.
    #[error("Expected exactly one registry match for {name}, found {count}")]
    AmbiguousModel {
        /// Descriptor name of the ambiguous model.
        name: String,
        /// Number of matches found.
        count: usize,
    },

    // === Type Identity Errors ===
    /// A resolved model handle is not of the expected kind.
    #[error("Model type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The kind the pipeline stage requires.
        expected: ModelKind,
        /// The kind the registry actually produced.
        actual: ModelKind,
    },

    // === Shape Errors ===
    /// The conditioning token count does not form a square spatial grid.
    #[error("Token count {tokens} is not a perfect square; cannot reshape to a spatial grid")]
    NonSquareTokenGrid {
        /// The offending token count.
        tokens: usize,
    },

    // === Validation Errors ===
    /// A request or config field is out of its documented range.
    #[error("Invalid value for {name}: {value} (expected {expected})")]
    InvalidParameter {
        /// Field name.
        name: &'static str,
        /// The rejected value, rendered for diagnostics.
        value: String,
        /// Human-readable description of the accepted range.
        expected: &'static str,
    },

    /// The cancel token fired while blocked on the install wait.
    #[error("Invocation cancelled while waiting for a model install")]
    Cancelled,

    // === Infrastructure Errors ===
    /// Model weight loading failed (missing file, parse error, device transfer).
    #[error("Model load failed for {name}: {reason}")]
    ModelLoad {
        /// Name or key of the model being loaded.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Invalid image data (decode failure, unsupported layout).
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    /// Image or tensor store operation failed.
    #[error("Store error: {reason}")]
    Store { reason: String },

    /// Tensor operation failed.
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Image decode/encode error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File I/O error (model weights, config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for conditioning-pipeline operations.
pub type ReduxResult<T> = Result<T, ReduxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    // ==================== Configuration Errors ====================

    #[test]
    fn test_model_unavailable_names_the_descriptor() {
        let err = ReduxError::ModelUnavailable {
            name: "SigLIP".to_string(),
            kind: ModelKind::SigLip,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("SigLIP"));
        assert!(msg.contains("siglip"));
    }

    #[test]
    fn test_install_timeout_shows_bound() {
        let err = ReduxError::InstallTimeout {
            name: "SigLIP".to_string(),
            timeout_secs: 600,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("SigLIP"));
        assert!(msg.contains("600"));
    }

    #[test]
    fn test_ambiguous_model_shows_count() {
        let err = ReduxError::AmbiguousModel {
            name: "SigLIP".to_string(),
            count: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("exactly one"));
        assert!(msg.contains('3'));
    }

    // ==================== Type / Shape Errors ====================

    #[test]
    fn test_type_mismatch_shows_both_kinds() {
        let err = ReduxError::TypeMismatch {
            expected: ModelKind::Redux,
            actual: ModelKind::SigLip,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("redux"));
        assert!(msg.contains("siglip"));
    }

    #[test]
    fn test_non_square_token_grid_shows_tokens() {
        let err = ReduxError::NonSquareTokenGrid { tokens: 730 };
        assert!(format!("{}", err).contains("730"));
    }

    #[test]
    fn test_invalid_parameter_shows_field_and_range() {
        let err = ReduxError::InvalidParameter {
            name: "downsampling_factor",
            value: "12".to_string(),
            expected: "an integer in [1, 9]",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("downsampling_factor"));
        assert!(msg.contains("12"));
        assert!(msg.contains("[1, 9]"));
    }

    // ==================== Conversions ====================

    #[test]
    fn test_io_error_conversion_via_question_mark() {
        fn fallible_io() -> ReduxResult<()> {
            let _ = std::fs::read("/nonexistent/path/for/redux/tests")?;
            Ok(())
        }
        assert!(matches!(fallible_io(), Err(ReduxError::Io(_))));
    }

    #[test]
    fn test_io_error_preserves_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "weights missing");
        let err = ReduxError::Io(io_err);
        assert!(err.source().is_some());
    }

    // ==================== Send + Sync ====================

    #[test]
    fn test_redux_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReduxError>();
    }
}

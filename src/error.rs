//! Unified error types for vocal-split
//!
//! Error strategy:
//! - Per-file errors (decode, unsupported format): Recoverable, skip and continue
//! - Configuration, model and output errors: Fatal, abort the run
//! - Inference and reconstruction errors abort the whole separation call
//!   with no partial results; the pipeline counts the file as failed
//!
//! All errors include actionable suggestions where possible.

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, OGG, AIFF";

/// Top-level error type for vocal-split operations
#[derive(Debug, Error)]
pub enum SplitError {
    // =========================================================================
    // Separation core
    // =========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}\n  Tip: n_fft and cropsize must match the shape the model was trained with")]
    Configuration(String),

    #[error("Model inference failed: {reason}\n  Tip: This may indicate insufficient memory (try a smaller --batchsize) or an incompatible model file")]
    ModelInference { reason: String },

    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    // =========================================================================
    // Recoverable errors - skip file, continue batch
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    Decode { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Fatal errors - abort the run
    // =========================================================================
    #[error("Separation model unavailable: {reason}\n\n  To provide a model, either:\n  1. Pass --model /path/to/model.onnx\n  2. Set VOCAL_SPLIT_MODEL_PATH=/path/to/model.onnx\n  3. Pass --model-url to download it into the cache")]
    ModelUnavailable { reason: String },

    #[error("Model download failed: {reason}")]
    ModelDownload { reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    Output { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for vocal-split operations
pub type Result<T> = std::result::Result<T, SplitError>;

impl SplitError {
    /// Returns true if this error is recoverable (should skip file, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SplitError::Decode { .. }
                | SplitError::UnsupportedFormat { .. }
                | SplitError::FileNotFound(_)
                | SplitError::InvalidInput(_)
        )
    }

    /// Returns true if this error must abort the whole run
    ///
    /// Inference and reconstruction failures are neither: they fail the
    /// current file only.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SplitError::Configuration(_)
                | SplitError::ModelUnavailable { .. }
                | SplitError::ModelDownload { .. }
                | SplitError::Output { .. }
                | SplitError::Io(_)
        )
    }

    /// Create an inference error
    pub fn inference(reason: impl Into<String>) -> Self {
        SplitError::ModelInference {
            reason: reason.into(),
        }
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SplitError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                let parent = path
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                format!("Directory does not exist: {}", parent)
            }
            _ => err.to_string(),
        };
        SplitError::Output { path, reason }
    }

    /// Create a model unavailable error when the backend is not compiled in
    pub fn backend_disabled() -> Self {
        SplitError::ModelUnavailable {
            reason: "ONNX model backend not compiled in. Build with --features onnx".to_string(),
        }
    }
}

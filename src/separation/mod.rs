//! Vocal/instrumental separation
//!
//! A pretrained mask model is applied to the stereo spectrogram in
//! fixed-width crops. The predicted instrumental mask is multiplied into the
//! complex spectrogram (keeping the original phase) and the vocals are the
//! remainder.

pub mod augment;
pub mod inference;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod postprocess;
pub mod separator;
pub mod stft;
pub mod tiling;

pub use inference::{InferenceEngine, InputLayout, MaskModel, ModelContract};
pub use separator::Separator;

use crate::config::SeparationConfig;
use crate::error::Result;
use crate::types::{Separation, Waveform};
use std::sync::Arc;

/// Separate one waveform with a one-off [`Separator`]
pub fn separate(
    waveform: &Waveform,
    model: Arc<dyn MaskModel>,
    config: SeparationConfig,
) -> Result<Separation> {
    Separator::new(model, config)?.separate_waveform(waveform)
}

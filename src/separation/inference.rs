//! Inference engine around an immutable mask model
//!
//! The model is a black box with a fixed tensor contract: a batch of crops
//! `(batch, channels, frequency_bins, cropsize)` goes in, a batch of
//! instrumental masks `(batch, 2, frequency_bins, cropsize - 2 * offset)`
//! comes out. Both directions are checked here so a mismatch between the
//! configuration and the loaded artifact surfaces as an error instead of
//! being coerced.

use crate::error::{Result, SplitError};
use crate::separation::stft::PIPELINE_CHANNELS;
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// How the complex spectrogram is wrapped into the model's real input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLayout {
    /// Per-channel magnitudes: 2 input channels
    #[default]
    Magnitude,
    /// Real parts then imaginary parts: 4 input channels
    RealImag,
}

impl InputLayout {
    /// Number of channels in the model input tensor
    pub fn channels(self) -> usize {
        match self {
            InputLayout::Magnitude => PIPELINE_CHANNELS,
            InputLayout::RealImag => 2 * PIPELINE_CHANNELS,
        }
    }
}

/// Tensor contract of a trained model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelContract {
    /// Frequency bins per crop (n_fft / 2 + 1)
    pub frequency_bins: usize,
    /// Context frames on each side of a crop that the model does not predict
    pub offset: usize,
    /// Input width the artifact was exported with, if static
    pub crop_width: Option<usize>,
    /// Input tensor layout
    pub layout: InputLayout,
}

impl ModelContract {
    /// Contract for a magnitude model without context trimming
    pub fn new(frequency_bins: usize) -> Self {
        Self {
            frequency_bins,
            offset: 0,
            crop_width: None,
            layout: InputLayout::Magnitude,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_crop_width(mut self, crop_width: usize) -> Self {
        self.crop_width = Some(crop_width);
        self
    }

    pub fn with_layout(mut self, layout: InputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Frames the model predicts for a crop of `cropsize` frames
    pub fn output_width(&self, cropsize: usize) -> Option<usize> {
        cropsize
            .checked_sub(2 * self.offset)
            .filter(|&width| width > 0)
    }
}

/// Mask prediction backend
///
/// Implementations must be pure: the same batch always yields the same masks,
/// and predicting never mutates model parameters.
pub trait MaskModel: Send + Sync {
    /// Predict instrumental masks in `[0, 1]` for a batch of crops
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>>;

    /// Tensor contract of the loaded artifact
    fn contract(&self) -> &ModelContract;

    /// Get the name of this model backend (for logging)
    fn name(&self) -> &'static str;
}

/// Validating wrapper owning the shared model
#[derive(Clone)]
pub struct InferenceEngine {
    model: Arc<dyn MaskModel>,
}

impl InferenceEngine {
    pub fn new(model: Arc<dyn MaskModel>) -> Self {
        Self { model }
    }

    pub fn contract(&self) -> &ModelContract {
        self.model.contract()
    }

    /// Run one forward pass over a batch of crops
    pub fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let contract = self.model.contract();
        let (n, channels, bins, width) = batch.dim();

        if n == 0 {
            return Err(SplitError::inference("empty batch"));
        }
        if channels != contract.layout.channels() || bins != contract.frequency_bins {
            return Err(SplitError::inference(format!(
                "crop shape {:?} does not match model input ({} channels x {} bins)",
                batch.shape(),
                contract.layout.channels(),
                contract.frequency_bins
            )));
        }
        if let Some(expected) = contract.crop_width {
            if width != expected {
                return Err(SplitError::inference(format!(
                    "crop width {} does not match model input width {}",
                    width, expected
                )));
            }
        }
        let out_width = contract.output_width(width).ok_or_else(|| {
            SplitError::inference(format!(
                "crop width {} leaves no frames after trimming {} context frames per side",
                width, contract.offset
            ))
        })?;

        trace!("Predicting batch of {} crops with {}", n, self.model.name());
        let masks = self.model.predict(batch)?;

        let expected = (n, PIPELINE_CHANNELS, bins, out_width);
        if masks.dim() != expected {
            return Err(SplitError::inference(format!(
                "model returned shape {:?}, expected {:?}",
                masks.shape(),
                expected
            )));
        }
        if masks.iter().any(|v| !v.is_finite()) {
            return Err(SplitError::inference("model returned non-finite mask values"));
        }

        Ok(masks)
    }
}

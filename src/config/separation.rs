//! Separation parameters shared by the library and the CLI

use crate::error::{Result, SplitError};
use crate::separation::stft::{self, DEFAULT_HOP_LENGTH, DEFAULT_N_FFT};
use serde::{Deserialize, Serialize};

/// Default sample rate the pipeline resamples to (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of crops per inference batch
pub const DEFAULT_BATCHSIZE: usize = 4;

/// Default crop width in frames
pub const DEFAULT_CROPSIZE: usize = 256;

/// Parameters of one separation run
///
/// `n_fft` and `cropsize` must match the shapes the model was trained with;
/// [`Separator::new`](crate::separation::Separator::new) checks them against
/// the model contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// Sample rate the model expects (Hz)
    pub sample_rate: u32,
    /// FFT window size
    pub n_fft: usize,
    /// Hop between STFT frames
    pub hop_length: usize,
    /// Crops per inference batch
    pub batchsize: usize,
    /// Crop width in frames
    pub cropsize: usize,
    /// Refine the instrumental with the soft vocal mask
    pub postprocess: bool,
    /// Average a second, time-shifted inference pass
    pub tta: bool,
    /// TTA shift in frames (defaults to half the predicted crop width)
    pub tta_shift: Option<usize>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            n_fft: DEFAULT_N_FFT,
            hop_length: DEFAULT_HOP_LENGTH,
            batchsize: DEFAULT_BATCHSIZE,
            cropsize: DEFAULT_CROPSIZE,
            postprocess: false,
            tta: false,
            tta_shift: None,
        }
    }
}

impl SeparationConfig {
    /// Check the parameters on their own, without a model
    pub fn validate(&self) -> Result<()> {
        stft::validate_params(self.n_fft, self.hop_length)?;

        if self.sample_rate == 0 {
            return Err(SplitError::Configuration(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.batchsize == 0 {
            return Err(SplitError::Configuration(
                "batchsize must be at least 1".to_string(),
            ));
        }
        if self.cropsize == 0 {
            return Err(SplitError::Configuration(
                "cropsize must be at least 1".to_string(),
            ));
        }
        if let Some(shift) = self.tta_shift {
            if shift >= self.cropsize {
                return Err(SplitError::Configuration(format!(
                    "tta_shift {} must be smaller than cropsize {}",
                    shift, self.cropsize
                )));
            }
        }
        Ok(())
    }

    /// Frequency bins produced by this `n_fft`
    pub fn frequency_bins(&self) -> usize {
        stft::num_bins(self.n_fft)
    }

    /// Suffix appended to output file stems (".tta", ".postprocess")
    pub fn output_suffix(&self) -> String {
        let mut suffix = String::new();
        if self.tta {
            suffix.push_str(".tta");
        }
        if self.postprocess {
            suffix.push_str(".postprocess");
        }
        suffix
    }
}

/// Where model inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    /// Platform accelerator (CoreML, DirectML or CUDA) with CPU fallback
    Accelerator,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator => write!(f, "accelerator"),
        }
    }
}

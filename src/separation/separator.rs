//! Separator: spectrogram in, instrumental and vocal spectrograms out
//!
//! Pipeline per call:
//! 1. Wrap the complex spectrogram into the model's real input and normalize
//!    it by its peak value
//! 2. Tile, batch, predict and stitch to a full-length instrumental mask
//!    (twice with a time shift when TTA is on)
//! 3. instrumental = mask * X, vocals = X - instrumental
//! 4. Optionally refine the instrumental with the soft vocal mask
//!
//! The separator holds the model read-only, so one instance can serve any
//! number of calls, and several separators with different configurations
//! can share one model.

use crate::config::SeparationConfig;
use crate::error::{Result, SplitError};
use crate::separation::augment::Augmentor;
use crate::separation::inference::{InferenceEngine, MaskModel};
use crate::separation::postprocess::postprocess;
use crate::separation::stft::{self, PIPELINE_CHANNELS};
use crate::separation::tiling;
use crate::types::{Separation, Spectrogram, Waveform};
use ndarray::{Array3, ArrayView3, Zip};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Vocal/instrumental separator bound to one model and configuration
#[derive(Clone)]
pub struct Separator {
    engine: InferenceEngine,
    config: SeparationConfig,
}

impl Separator {
    /// Create a separator, checking `config` against the model contract
    pub fn new(model: Arc<dyn MaskModel>, config: SeparationConfig) -> Result<Self> {
        config.validate()?;
        let contract = model.contract();

        if contract.frequency_bins != config.frequency_bins() {
            return Err(SplitError::Configuration(format!(
                "n_fft {} gives {} frequency bins but the model expects {}",
                config.n_fft,
                config.frequency_bins(),
                contract.frequency_bins
            )));
        }
        if let Some(width) = contract.crop_width {
            if width != config.cropsize {
                return Err(SplitError::Configuration(format!(
                    "cropsize {} does not match the model input width {}",
                    config.cropsize, width
                )));
            }
        }
        if config.cropsize <= 2 * contract.offset {
            return Err(SplitError::Configuration(format!(
                "cropsize {} must exceed twice the model offset {}",
                config.cropsize, contract.offset
            )));
        }

        info!(
            "Separator ready: model={}, n_fft={}, hop={}, cropsize={}, batchsize={}, tta={}, postprocess={}",
            model.name(),
            config.n_fft,
            config.hop_length,
            config.cropsize,
            config.batchsize,
            config.tta,
            config.postprocess
        );

        Ok(Self {
            engine: InferenceEngine::new(model),
            config,
        })
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Frames predicted per crop
    pub fn roi(&self) -> usize {
        self.config.cropsize - 2 * self.engine.contract().offset
    }

    /// Frames the TTA pass shifts by
    pub fn tta_shift(&self) -> usize {
        self.config.tta_shift.unwrap_or(self.roi() / 2)
    }

    /// Split a spectrogram into (instrumental, vocals)
    pub fn separate(&self, spectrogram: &Spectrogram) -> Result<(Spectrogram, Spectrogram)> {
        let input = self.model_input(spectrogram)?;
        let mask = self.predict_mask(input.view())?;
        self.apply_mask(spectrogram, &mask)
    }

    /// Split a spectrogram with test-time augmentation
    pub fn separate_tta(&self, spectrogram: &Spectrogram) -> Result<(Spectrogram, Spectrogram)> {
        let input = self.model_input(spectrogram)?;
        let mask = Augmentor::new(self.tta_shift())
            .predict(input.view(), |shifted| self.predict_mask(shifted))?;
        self.apply_mask(spectrogram, &mask)
    }

    /// Split a waveform into instrumental and vocal waveforms
    ///
    /// Both outputs have exactly the input's length and sample rate. A mono
    /// input yields mono outputs.
    pub fn separate_waveform(&self, waveform: &Waveform) -> Result<Separation> {
        if waveform.sample_rate() != self.config.sample_rate {
            return Err(SplitError::InvalidInput(format!(
                "waveform sample rate {} Hz differs from the configured {} Hz",
                waveform.sample_rate(),
                self.config.sample_rate
            )));
        }

        let start = Instant::now();
        let length = waveform.len();
        let spectrogram = stft::forward(waveform, self.config.n_fft, self.config.hop_length)?;

        let (instrumental, vocals) = if self.config.tta {
            self.separate_tta(&spectrogram)?
        } else {
            self.separate(&spectrogram)?
        };

        let mut instrumental = stft::inverse(&instrumental, self.config.hop_length, Some(length))?;
        let mut vocals = stft::inverse(&vocals, self.config.hop_length, Some(length))?;

        if waveform.channels() == 1 {
            instrumental = instrumental.to_mono();
            vocals = vocals.to_mono();
        }

        info!(
            "Separated {:.1}s of audio in {:.2}s",
            waveform.duration(),
            start.elapsed().as_secs_f64()
        );

        Ok(Separation {
            instrumental,
            vocals,
        })
    }

    /// Peak-normalized model input for a spectrogram
    fn model_input(&self, spectrogram: &Spectrogram) -> Result<Array3<f32>> {
        let (channels, bins, frames) = spectrogram.shape();
        if channels != PIPELINE_CHANNELS {
            return Err(SplitError::InvalidInput(format!(
                "spectrogram has {} channels, expected {}",
                channels, PIPELINE_CHANNELS
            )));
        }
        if frames == 0 {
            return Err(SplitError::InvalidInput(
                "spectrogram has no time frames".to_string(),
            ));
        }
        if bins != self.engine.contract().frequency_bins {
            return Err(SplitError::Configuration(format!(
                "spectrogram has {} frequency bins but the model expects {}",
                bins,
                self.engine.contract().frequency_bins
            )));
        }

        let mut input = stft::to_model_input(spectrogram, self.engine.contract().layout);
        let peak = input.iter().fold(0.0f32, |peak, v| peak.max(v.abs()));
        if peak > 0.0 {
            input.mapv_inplace(|v| v / peak);
        }
        Ok(input)
    }

    /// Full-length mask for a model input of shape (channels, bins, frames)
    fn predict_mask(&self, input: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
        let frames = input.dim().2;
        let tiler = tiling::tile(input, self.config.cropsize, self.engine.contract().offset)?;

        debug!(
            "Predicting {} crops of {} frames in batches of {}",
            tiler.len(),
            self.config.cropsize,
            self.config.batchsize
        );

        let predictions = tiler
            .batches(self.config.batchsize)
            .map(|batch| self.engine.predict(batch.view()))
            .collect::<Result<Vec<_>>>()?;

        tiling::stitch(predictions, frames)
    }

    fn apply_mask(
        &self,
        spectrogram: &Spectrogram,
        mask: &Array3<f32>,
    ) -> Result<(Spectrogram, Spectrogram)> {
        if mask.dim() != spectrogram.shape() {
            return Err(SplitError::inference(format!(
                "mask shape {:?} does not match spectrogram shape {:?}",
                mask.shape(),
                spectrogram.data.shape()
            )));
        }

        let mut instrumental = spectrogram.data.clone();
        Zip::from(&mut instrumental)
            .and(mask)
            .for_each(|bin, &m| *bin *= m);
        let vocals = &spectrogram.data - &instrumental;

        let instrumental = Spectrogram::new(instrumental, spectrogram.sample_rate);
        let vocals = Spectrogram::new(vocals, spectrogram.sample_rate);

        let instrumental = if self.config.postprocess {
            postprocess(&instrumental, &vocals)?
        } else {
            instrumental
        };

        Ok((instrumental, vocals))
    }
}

//! Core data types for vocal-split
//!
//! These types represent the domain model and flow through the pipeline.

use crate::error::{Result, SplitError};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Audio buffers
// =============================================================================

/// Multi-channel audio samples, shape (channels, samples)
///
/// Holds one or two channels. The sample rate is metadata carried alongside
/// the tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Array2<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap a (channels, samples) tensor
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Result<Self> {
        let channels = samples.nrows();
        if !(1..=2).contains(&channels) {
            return Err(SplitError::InvalidInput(format!(
                "expected 1 or 2 channels, got {}",
                channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a mono waveform
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        let samples = Array1::from(samples).insert_axis(Axis(0));
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a stereo waveform from separate channel vectors
    ///
    /// The longer channel is truncated to the shorter one.
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        let len = left.len().min(right.len());
        let mut samples = Array2::zeros((2, len));
        samples
            .row_mut(0)
            .assign(&ArrayView1::from(&left[..len]));
        samples
            .row_mut(1)
            .assign(&ArrayView1::from(&right[..len]));
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create from interleaved samples [L, R, L, R, ...]
    ///
    /// Channel counts above two are downmixed by keeping the front pair.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        match channels {
            0 => Err(SplitError::InvalidInput(
                "interleaved buffer declares zero channels".to_string(),
            )),
            1 => Ok(Self::mono(interleaved.to_vec(), sample_rate)),
            _ => {
                let num_frames = interleaved.len() / channels;
                let mut left = Vec::with_capacity(num_frames);
                let mut right = Vec::with_capacity(num_frames);
                for frame in interleaved.chunks_exact(channels) {
                    left.push(frame[0]);
                    right.push(frame[1]);
                }
                Ok(Self::stereo(left, right, sample_rate))
            }
        }
    }

    /// Get interleaved samples [L, R, L, R, ...]
    pub fn interleaved(&self) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.samples.len());
        for frame in self.samples.axis_iter(Axis(1)) {
            result.extend(frame.iter().copied());
        }
        result
    }

    /// Duplicate a mono waveform into two identical channels
    pub fn into_stereo(self) -> Self {
        if self.channels() == 2 {
            return self;
        }
        let row = self.samples.row(0);
        let mut samples = Array2::zeros((2, row.len()));
        samples.row_mut(0).assign(&row);
        samples.row_mut(1).assign(&row);
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.samples.nrows()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.samples.ncols()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0 {
            self.len() as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Self {
        let mixed = self
            .samples
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(0));
        Self {
            samples: mixed.insert_axis(Axis(0)),
            sample_rate: self.sample_rate,
        }
    }

    pub fn channel(&self, index: usize) -> ArrayView1<'_, f32> {
        self.samples.row(index)
    }

    pub fn samples(&self) -> &Array2<f32> {
        &self.samples
    }
}

// =============================================================================
// Spectral types
// =============================================================================

/// Complex spectrogram, shape (channels, frequency_bins, time_frames)
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub data: Array3<Complex32>,
    /// Sample rate of the source waveform
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn new(data: Array3<Complex32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn bins(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[2]
    }

    /// Get the shape as (channels, freq_bins, time_frames)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels(), self.bins(), self.frames())
    }

    /// Elementwise magnitude
    pub fn magnitude(&self) -> Array3<f32> {
        self.data.mapv(|c| c.norm())
    }

    /// Transform size implied by a one-sided spectrum
    pub fn n_fft(&self) -> usize {
        2 * self.bins().saturating_sub(1)
    }
}

/// Instrumental and vocal waveforms produced from one input
#[derive(Debug, Clone)]
pub struct Separation {
    pub instrumental: Waveform,
    pub vocals: Waveform,
}

// =============================================================================
// Output description
// =============================================================================

/// Paths to the written output files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    pub instrumental: PathBuf,
    pub vocals: PathBuf,
}

impl OutputPaths {
    pub fn exist(&self) -> bool {
        self.instrumental.exists() && self.vocals.exists()
    }
}

/// Summary of one separated track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparatedTrack {
    /// Original file path
    pub path: PathBuf,
    /// Written outputs
    pub outputs: OutputPaths,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Sample rate of the outputs
    pub sample_rate: u32,
    /// Wall-clock separation time in seconds
    pub elapsed_seconds: f64,
    /// Timestamp of separation
    pub separated_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio formats accepted as input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Ogg,
    Aiff,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}

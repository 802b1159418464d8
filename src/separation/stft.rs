//! STFT (Short-Time Fourier Transform) codec for the separation model
//!
//! Converts a stereo waveform into a complex spectrogram and back.
//!
//! # Parameter Choices
//!
//! - **Hann window** (periodic): smooth tapering reduces spectral leakage.
//! - **Centered frames**: the signal is reflect-padded by `n_fft / 2` on both
//!   sides so frame `k` is centered on sample `k * hop_length`. This gives
//!   `1 + ceil(samples / hop_length)` frames, so the last frame is centered at
//!   or past the final sample and every sample has a usable window sum.
//! - **Overlap-add normalization** by the summed squared window, so any
//!   `hop_length < n_fft` reconstructs the input without intensity drift.
//!
//! No clipping or renormalization happens here; the caller owns that.

use crate::error::{Result, SplitError};
use crate::separation::inference::InputLayout;
use crate::types::{Spectrogram, Waveform};
use ndarray::{s, Array2, Array3, ArrayView1, Axis};
use rustfft::{num_complex::Complex32, FftPlanner};
use tracing::debug;

/// Default FFT window size (2048 samples = ~46ms at 44.1kHz)
pub const DEFAULT_N_FFT: usize = 2048;

/// Default hop length between frames (50% overlap)
pub const DEFAULT_HOP_LENGTH: usize = 1024;

/// Channels the pipeline operates on internally
pub const PIPELINE_CHANNELS: usize = 2;

/// Smallest overlap-add weight treated as covered
const WINDOW_SUM_EPSILON: f32 = 1e-8;

/// Number of frequency bins in the positive-frequency half of the spectrum
pub fn num_bins(n_fft: usize) -> usize {
    n_fft / 2 + 1
}

/// Check the transform parameters
pub fn validate_params(n_fft: usize, hop_length: usize) -> Result<()> {
    if n_fft < 2 || n_fft % 2 != 0 {
        return Err(SplitError::Configuration(format!(
            "n_fft must be a positive even integer, got {}",
            n_fft
        )));
    }
    if hop_length == 0 || hop_length >= n_fft {
        return Err(SplitError::Configuration(format!(
            "hop_length must be in 1..{} (below n_fft), got {}",
            n_fft, hop_length
        )));
    }
    Ok(())
}

/// Compute the STFT of a waveform
///
/// Mono input is expanded to two identical channels first.
pub fn forward(waveform: &Waveform, n_fft: usize, hop_length: usize) -> Result<Spectrogram> {
    validate_params(n_fft, hop_length)?;

    if waveform.is_empty() {
        return Err(SplitError::InvalidInput(
            "waveform has zero samples".to_string(),
        ));
    }

    let expanded;
    let stereo = match waveform.channels() {
        PIPELINE_CHANNELS => waveform,
        1 => {
            expanded = waveform.clone().into_stereo();
            &expanded
        }
        other => {
            return Err(SplitError::InvalidInput(format!(
                "unsupported channel count {}",
                other
            )))
        }
    };

    let num_frames = 1 + stereo.len().div_ceil(hop_length);
    let bins = num_bins(n_fft);
    let mut data = Array3::<Complex32>::zeros((PIPELINE_CHANNELS, bins, num_frames));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    for (ch, mut channel_spec) in data.axis_iter_mut(Axis(0)).enumerate() {
        let samples = stereo.channel(ch);
        for frame_idx in 0..num_frames {
            fill_frame(&mut buffer, &samples, &window, frame_idx * hop_length, n_fft / 2);
            fft.process_with_scratch(&mut buffer, &mut scratch);
            channel_spec
                .slice_mut(s![.., frame_idx])
                .assign(&ArrayView1::from(&buffer[..bins]));
        }
    }

    debug!(
        "STFT: {} samples -> {} bins x {} frames (n_fft={}, hop={})",
        stereo.len(),
        bins,
        num_frames,
        n_fft,
        hop_length
    );

    Ok(Spectrogram::new(data, waveform.sample_rate()))
}

/// Window one centered frame into `buffer`, reflecting at the signal edges
fn fill_frame(
    buffer: &mut [Complex32],
    samples: &ArrayView1<'_, f32>,
    window: &[f32],
    padded_start: usize,
    pad: usize,
) {
    let len = samples.len();
    for (i, (slot, &w)) in buffer.iter_mut().zip(window).enumerate() {
        let pos = (padded_start + i) as isize - pad as isize;
        *slot = Complex32::new(samples[reflect_index(pos, len)] * w, 0.0);
    }
}

/// Mirror an out-of-range index back into `0..len` (numpy "reflect" padding)
fn reflect_index(pos: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = pos.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

/// Compute the inverse STFT
///
/// The transform size is derived from the bin count. Without `length` the
/// output holds `hop_length * (frames - 1)` samples; with it the output is
/// trimmed or zero-padded to exactly that many.
pub fn inverse(
    spectrogram: &Spectrogram,
    hop_length: usize,
    length: Option<usize>,
) -> Result<Waveform> {
    let (channels, bins, num_frames) = spectrogram.shape();
    if bins < 2 {
        return Err(SplitError::Configuration(format!(
            "spectrogram has {} frequency bins, need at least 2",
            bins
        )));
    }
    let n_fft = spectrogram.n_fft();
    validate_params(n_fft, hop_length)?;

    if num_frames == 0 || channels == 0 {
        return Err(SplitError::Reconstruction(
            "spectrogram has no frames".to_string(),
        ));
    }

    let pad = n_fft / 2;
    let padded_len = n_fft + hop_length * (num_frames - 1);
    let output_len = length.unwrap_or(hop_length * (num_frames - 1));
    if output_len == 0 {
        return Err(SplitError::Reconstruction(
            "inverse transform would produce an empty waveform".to_string(),
        ));
    }

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let window = hann_window(n_fft);
    let mut scratch = vec![Complex32::new(0.0, 0.0); ifft.get_inplace_scratch_len()];

    let mut window_sum = vec![0.0f32; padded_len];
    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        for (i, &w) in window.iter().enumerate() {
            window_sum[start + i] += w * w;
        }
    }

    let scale = 1.0 / n_fft as f32;
    let mut output = Array2::<f32>::zeros((channels, output_len));
    let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];
    let mut accum = vec![0.0f32; padded_len];

    for (ch, mut out_channel) in output.axis_iter_mut(Axis(0)).enumerate() {
        accum.iter_mut().for_each(|v| *v = 0.0);

        for frame_idx in 0..num_frames {
            let frame = spectrogram.data.slice(s![ch, .., frame_idx]);

            // Positive frequencies as-is, negative ones as conjugates
            for (i, &c) in frame.iter().enumerate() {
                buffer[i] = c;
            }
            for i in 1..bins - 1 {
                buffer[n_fft - i] = frame[i].conj();
            }

            ifft.process_with_scratch(&mut buffer, &mut scratch);

            let start = frame_idx * hop_length;
            for (i, &w) in window.iter().enumerate() {
                accum[start + i] += buffer[i].re * scale * w;
            }
        }

        for (i, sample) in out_channel.iter_mut().enumerate() {
            let j = i + pad;
            if j < padded_len && window_sum[j] > WINDOW_SUM_EPSILON {
                *sample = accum[j] / window_sum[j];
            }
        }
    }

    if output.iter().any(|v| !v.is_finite()) {
        return Err(SplitError::Reconstruction(
            "inverse transform produced non-finite samples".to_string(),
        ));
    }

    Waveform::new(output, spectrogram.sample_rate)
}

/// Wrap a spectrogram into the real-valued tensor the model consumes
///
/// `Magnitude` keeps (channels, bins, frames); `RealImag` stacks real parts
/// followed by imaginary parts into (2 * channels, bins, frames).
pub fn to_model_input(spectrogram: &Spectrogram, layout: InputLayout) -> Array3<f32> {
    match layout {
        InputLayout::Magnitude => spectrogram.magnitude(),
        InputLayout::RealImag => {
            let re = spectrogram.data.mapv(|c| c.re);
            let im = spectrogram.data.mapv(|c| c.im);
            ndarray::concatenate(Axis(0), &[re.view(), im.view()])
                .unwrap_or_else(|_| Array3::zeros((0, spectrogram.bins(), spectrogram.frames())))
        }
    }
}

/// Generate a periodic Hann window of given size
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

//! Audio decoding using symphonia
//!
//! Decodes audio files to f32 waveforms at the target sample rate, keeping
//! mono as mono and stereo as stereo. Uses rubato for high-quality
//! resampling with proper anti-aliasing.

use crate::error::{Result, SplitError};
use crate::types::{AudioFormat, Waveform};
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
/// Prevents OOM on extremely large files
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Decode an audio file and resample it to `target_rate`
///
/// Files with more than two channels keep their front left/right pair.
pub fn decode(path: &Path, target_rate: u32) -> Result<Waveform> {
    if !path.exists() {
        return Err(SplitError::FileNotFound(path.to_path_buf()));
    }
    if !AudioFormat::is_supported_path(path) {
        return Err(SplitError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    // Check file size before attempting to decode
    let metadata = std::fs::metadata(path).map_err(|e| {
        SplitError::decode_error(path, format!("Failed to read file metadata: {}", e))
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(SplitError::decode_error(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| SplitError::decode_error(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Provide a hint based on file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SplitError::decode_error(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| SplitError::decode_error(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        source_sample_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| SplitError::decode_error(path, format!("Failed to create decoder: {}", e)))?;

    // Collect all interleaved samples
    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(e) => {
                return Err(SplitError::decode_error(
                    path,
                    format!("Failed to read packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                // Skip corrupted frames
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(SplitError::decode_error(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend(sample_buf.samples());
    }

    if all_samples.is_empty() || channels == 0 {
        return Err(SplitError::decode_error(path, "File contains no audio samples"));
    }

    let waveform = Waveform::from_interleaved(&all_samples, channels, source_sample_rate)?;
    let waveform = resample_waveform(waveform, target_rate);

    debug!(
        "Decoded {} samples x {} channels ({:.2}s)",
        waveform.len(),
        waveform.channels(),
        waveform.duration()
    );

    Ok(waveform)
}

/// Resample every channel of `waveform` to `to_rate`
pub fn resample_waveform(waveform: Waveform, to_rate: u32) -> Waveform {
    let from_rate = waveform.sample_rate();
    if from_rate == to_rate {
        return waveform;
    }

    let channels: Vec<Vec<f32>> = (0..waveform.channels())
        .map(|ch| resample(&waveform.channel(ch).to_vec(), from_rate, to_rate))
        .collect();

    match channels.as_slice() {
        [mono] => Waveform::mono(mono.clone(), to_rate),
        [left, right] => Waveform::stereo(left.clone(), right.clone(), to_rate),
        _ => waveform,
    }
}

/// High-quality audio resampling using rubato
///
/// Uses FFT-based resampling with proper anti-aliasing filter to prevent
/// aliasing artifacts when downsampling, processed in fixed-size chunks.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    const CHUNK_SIZE: usize = 1024;

    let mut resampler = match FftFixedInOut::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        1,
    ) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rubato initialization failed ({}), using fallback", e);
            return resample_linear_fallback(samples, from_rate, to_rate);
        }
    };

    let input_frames_per_chunk = resampler.input_frames_next();
    let output_frames_per_chunk = resampler.output_frames_next();

    let ratio = to_rate as f64 / from_rate as f64;
    let estimated_output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(estimated_output_len);

    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + input_frames_per_chunk).min(samples.len());
        let mut chunk = samples[pos..end].to_vec();

        // Pad last chunk if needed
        if chunk.len() < input_frames_per_chunk {
            chunk.resize(input_frames_per_chunk, 0.0);
        }

        let input_channels = vec![chunk];

        match resampler.process(&input_channels, None) {
            Ok(resampled) => {
                if let Some(channel) = resampled.first() {
                    // Only take valid samples (not padding)
                    let valid_samples = if pos + input_frames_per_chunk > samples.len() {
                        let input_valid = samples.len() - pos;
                        let output_valid = (input_valid as f64 * ratio).ceil() as usize;
                        output_valid.min(output_frames_per_chunk)
                    } else {
                        output_frames_per_chunk
                    };
                    // Guard against floating-point rounding causing out-of-bounds
                    let safe_samples = valid_samples.min(channel.len());
                    output.extend_from_slice(&channel[..safe_samples]);
                }
            }
            Err(e) => {
                debug!("Rubato processing error ({}), using fallback for remaining", e);
                let remaining = resample_linear_fallback(&samples[pos..], from_rate, to_rate);
                output.extend(remaining);
                break;
            }
        }

        pos += input_frames_per_chunk;
    }

    output
}

/// Fallback linear interpolation resampler
///
/// Used only when rubato fails to initialize or process.
fn resample_linear_fallback(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio) as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos as usize;
            let frac = (src_pos - src_idx as f64) as f32;
            if src_idx + 1 < samples.len() {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else {
                samples[src_idx.min(samples.len() - 1)]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let t = i as f32 / sample_rate as f32;
                let value = 0.5 * (2.0 * PI * (440.0 + 110.0 * ch as f32) * t).sin();
                writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_stereo_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 44100, 4410);

        let wave = decode(&path, 44100).unwrap();
        assert_eq!(wave.channels(), 2);
        assert_eq!(wave.len(), 4410);
        assert_eq!(wave.sample_rate(), 44100);
        assert!(wave.channel(0) != wave.channel(1));
    }

    #[test]
    fn test_decode_keeps_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 44100, 2000);

        let wave = decode(&path, 44100).unwrap();
        assert_eq!(wave.channels(), 1);
    }

    #[test]
    fn test_decode_resamples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("low.wav");
        write_wav(&path, 2, 22050, 22050);

        let wave = decode(&path, 44100).unwrap();
        assert_eq!(wave.sample_rate(), 44100);
        assert!((wave.len() as f64 - 44100.0).abs() < 50.0);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode(Path::new("/nonexistent/track.wav"), 44100).unwrap_err();
        assert!(matches!(err, SplitError::FileNotFound(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();
        assert!(matches!(
            decode(&path, 44100),
            Err(SplitError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_decode_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"RIFF garbage").unwrap();
        let err = decode(&path, 44100).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let result = resample(&samples, 44100, 44100);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let result = resample(&samples, 44100, 22050);
        assert!((result.len() as f64 - 500.0).abs() < 2.0);
    }

    #[test]
    fn test_resample_sine_wave_integrity() {
        let samples: Vec<f32> = (0..2000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = resample(&samples, 44100, 48000);

        let max_val = result.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_val = result.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max_val > 0.9, "Max value {} should be > 0.9", max_val);
        assert!(min_val < -0.9, "Min value {} should be < -0.9", min_val);
    }

    #[test]
    fn test_resample_waveform_keeps_channels() {
        let wave = Waveform::stereo(vec![0.1; 1000], vec![-0.1; 1000], 48000);
        let resampled = resample_waveform(wave, 44100);
        assert_eq!(resampled.channels(), 2);
        assert_eq!(resampled.sample_rate(), 44100);
        assert!((resampled.len() as f64 - 918.75).abs() < 3.0);
    }

    #[test]
    fn test_resample_fallback_works() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let result = resample_linear_fallback(&samples, 44100, 22050);
        assert!((result.len() as f64 - 50.0).abs() < 2.0);
        assert!(resample_linear_fallback(&[], 44100, 22050).is_empty());
    }
}

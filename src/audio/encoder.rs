//! WAV output using hound
//!
//! Writes 16-bit PCM. Samples are clamped to the i16 range here, since the
//! separation core never clips.

use crate::error::{Result, SplitError};
use crate::types::Waveform;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Write `waveform` to `path` as 16-bit PCM WAV, creating parent directories
///
/// The file is written under a temporary name and renamed into place, so a
/// failed write never leaves a truncated output that would later be skipped
/// as already done.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SplitError::output_error(parent, e))?;
        }
    }

    let spec = hound::WavSpec {
        channels: waveform.channels() as u16,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let temp_path = path.with_extension("wav.tmp");
    let write_error = |e: hound::Error| SplitError::Output {
        path: path.to_path_buf(),
        reason: format!("Failed to write WAV: {}", e),
    };

    let mut writer = hound::WavWriter::create(&temp_path, spec).map_err(write_error)?;
    for sample in waveform.interleaved() {
        writer.write_sample(to_i16(sample)).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        SplitError::output_error(path, e)
    })?;

    debug!(
        "Wrote {} ({} channels, {:.2}s)",
        path.display(),
        waveform.channels(),
        waveform.duration()
    );
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

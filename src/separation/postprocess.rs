//! Postprocessing of the instrumental estimate
//!
//! Experimental. Each time-frequency bin of the instrumental spectrogram is
//! scaled by a soft mask built from the relative energy of the vocal and
//! instrumental estimates:
//!
//! ```text
//! gain = |I|^2 / (|I|^2 + |V|^2)
//! refined = gain * I
//! ```
//!
//! Bins where the vocal estimate dominates are pulled toward zero, which
//! suppresses residual vocal bleed but can also remove instrumental content
//! that shares a bin with the voice.

use crate::error::{Result, SplitError};
use crate::types::Spectrogram;
use ndarray::Zip;
use tracing::debug;

/// Exponent applied to magnitudes when building the soft mask
pub const MASK_POWER: i32 = 2;

/// Soft-mask gain for one bin
///
/// Returns 1 when both magnitudes are zero.
pub fn soft_mask_gain(instrumental_mag: f32, vocal_mag: f32) -> f32 {
    let inst = instrumental_mag.powi(MASK_POWER);
    let vocal = vocal_mag.powi(MASK_POWER);
    let total = inst + vocal;
    if total > 0.0 {
        inst / total
    } else {
        1.0
    }
}

/// Attenuate instrumental bins dominated by vocal energy
pub fn postprocess(instrumental: &Spectrogram, vocals: &Spectrogram) -> Result<Spectrogram> {
    if instrumental.shape() != vocals.shape() {
        return Err(SplitError::InvalidInput(format!(
            "instrumental shape {:?} differs from vocal shape {:?}",
            instrumental.shape(),
            vocals.shape()
        )));
    }

    let mut refined = instrumental.data.clone();
    Zip::from(&mut refined)
        .and(&vocals.data)
        .for_each(|inst, vocal| {
            *inst *= soft_mask_gain(inst.norm(), vocal.norm());
        });

    debug!("Postprocessed instrumental spectrogram {:?}", instrumental.shape());
    Ok(Spectrogram::new(refined, instrumental.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rustfft::num_complex::Complex32;

    fn single_bin(value: Complex32) -> Spectrogram {
        Spectrogram::new(Array3::from_elem((2, 1, 1), value), 44100)
    }

    #[test]
    fn test_gain_bounds() {
        assert_eq!(soft_mask_gain(0.0, 0.0), 1.0);
        assert_eq!(soft_mask_gain(1.0, 0.0), 1.0);
        assert_eq!(soft_mask_gain(1.0, 1.0), 0.5);
        assert!(soft_mask_gain(0.1, 10.0) < 1e-3);
    }

    #[test]
    fn test_vocal_dominated_bin_is_attenuated() {
        let inst = single_bin(Complex32::new(0.1, 0.05));
        let vocal = single_bin(Complex32::new(5.0, -2.0));
        let refined = postprocess(&inst, &vocal).unwrap();
        assert!(refined.data[[0, 0, 0]].norm() < inst.data[[0, 0, 0]].norm());
    }

    #[test]
    fn test_silent_vocal_bin_is_unchanged() {
        let inst = single_bin(Complex32::new(0.7, -0.3));
        let vocal = single_bin(Complex32::new(0.0, 0.0));
        let refined = postprocess(&inst, &vocal).unwrap();
        assert_eq!(refined, inst);
    }

    #[test]
    fn test_phase_is_preserved() {
        let inst = single_bin(Complex32::new(0.3, 0.4));
        let vocal = single_bin(Complex32::new(0.3, 0.0));
        let refined = postprocess(&inst, &vocal).unwrap();
        let before = inst.data[[1, 0, 0]].arg();
        let after = refined.data[[1, 0, 0]].arg();
        assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let inst = Spectrogram::new(Array3::zeros((2, 3, 4)), 44100);
        let vocal = Spectrogram::new(Array3::zeros((2, 3, 5)), 44100);
        assert!(postprocess(&inst, &vocal).is_err());
    }
}

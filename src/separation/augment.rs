//! Test-time augmentation
//!
//! Crop boundaries sit at fixed frame positions, and the model tends to leave
//! small artifacts there. Running the prediction a second time on an input
//! that is circularly shifted along time moves those boundaries; undoing the
//! shift and averaging the two masks smooths the artifacts out at roughly
//! twice the inference cost.

use crate::error::Result;
use ndarray::{concatenate, s, Array3, ArrayView3, Axis};
use tracing::debug;

/// Circularly shift a (channels, bins, frames) tensor along time
///
/// Positive `shift` moves content to later frames.
pub fn roll_time(input: ArrayView3<'_, f32>, shift: isize) -> Array3<f32> {
    let frames = input.dim().2;
    if frames == 0 {
        return input.to_owned();
    }
    let split = (frames as isize - shift).rem_euclid(frames as isize) as usize;
    if split == 0 {
        return input.to_owned();
    }
    // Result starts at the last `frames - split` frames of the input
    concatenate(
        Axis(2),
        &[input.slice(s![.., .., split..]), input.slice(s![.., .., ..split])],
    )
    .unwrap_or_else(|_| input.to_owned())
}

/// Two-pass shifted prediction averaged back into one mask
#[derive(Debug, Clone, Copy)]
pub struct Augmentor {
    shift: usize,
}

impl Augmentor {
    /// Augmentor shifting the input by `shift` frames
    pub fn new(shift: usize) -> Self {
        Self { shift }
    }

    /// Run `predict` on the input as-is and shifted, and average the results
    ///
    /// `predict` must map a (channels, bins, frames) input to a mask with the
    /// same number of frames.
    pub fn predict<F>(&self, input: ArrayView3<'_, f32>, predict: F) -> Result<Array3<f32>>
    where
        F: Fn(ArrayView3<'_, f32>) -> Result<Array3<f32>>,
    {
        let frames = input.dim().2;
        let base = predict(input)?;

        if frames == 0 || self.shift % frames == 0 {
            debug!("TTA shift is a multiple of the input length, second pass skipped");
            return Ok(base);
        }

        let shift = self.shift as isize;
        let shifted = roll_time(input, shift);
        let shifted_mask = predict(shifted.view())?;
        let restored = roll_time(shifted_mask.view(), -shift);

        debug!("TTA averaged two passes (shift {} frames)", self.shift);
        Ok((base + restored) * 0.5)
    }
}

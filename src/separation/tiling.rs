//! Spectrogram tiling, batching and stitching
//!
//! The model consumes fixed-width crops, so a long spectrogram is cut into
//! consecutive crops along the time axis, grouped into batches for
//! throughput, and the per-crop predictions are stitched back together.
//!
//! Each crop may carry `offset` frames of context on both sides. The model
//! predicts only the centre `roi = cropsize - 2 * offset` frames, so crops
//! advance by `roi` and overlap by `2 * offset`:
//!
//! ```text
//! padded:  |off|      roi      |      roi      |  roi + pad  |off|
//! crop 0:  [off|      roi      |off]
//! crop 1:                  [off|      roi      |off]
//! ```
//!
//! With `offset = 0` this reduces to back-to-back crops with the last one
//! zero-padded on the right.

use crate::error::{Result, SplitError};
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

/// Placement of crops over a spectrogram of a given length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    /// Crop width fed to the model
    pub cropsize: usize,
    /// Context frames on each side of a crop
    pub offset: usize,
    /// Frames predicted per crop
    pub roi: usize,
    /// Unpadded time length
    pub frames: usize,
    /// Number of crops
    pub num_crops: usize,
    /// Zero frames added on the left
    pub pad_left: usize,
    /// Zero frames added on the right
    pub pad_right: usize,
}

impl TileLayout {
    pub fn new(frames: usize, cropsize: usize, offset: usize) -> Result<Self> {
        if cropsize == 0 {
            return Err(SplitError::Configuration(
                "cropsize must be at least 1".to_string(),
            ));
        }
        if cropsize <= 2 * offset {
            return Err(SplitError::Configuration(format!(
                "cropsize {} must exceed twice the model offset {}",
                cropsize, offset
            )));
        }
        if frames == 0 {
            return Err(SplitError::InvalidInput(
                "spectrogram has no time frames".to_string(),
            ));
        }

        let roi = cropsize - 2 * offset;
        let num_crops = frames.div_ceil(roi);
        let padded_width = num_crops * roi + 2 * offset;

        Ok(Self {
            cropsize,
            offset,
            roi,
            frames,
            num_crops,
            pad_left: offset,
            pad_right: padded_width - offset - frames,
        })
    }

    /// Total width after padding
    pub fn padded_width(&self) -> usize {
        self.pad_left + self.frames + self.pad_right
    }
}

/// One crop of the padded input
#[derive(Debug, Clone)]
pub struct Crop<'a> {
    /// First predicted frame in the unpadded input
    pub start_frame: usize,
    /// Crop data, shape (channels, bins, cropsize)
    pub data: ArrayView3<'a, f32>,
}

/// Padded model input ready to be cut into crops
#[derive(Debug)]
pub struct Tiler {
    padded: Array3<f32>,
    layout: TileLayout,
}

/// Pad `input` (channels, bins, frames) for cropping at `cropsize`
pub fn tile(input: ArrayView3<'_, f32>, cropsize: usize, offset: usize) -> Result<Tiler> {
    let (channels, bins, frames) = input.dim();
    let layout = TileLayout::new(frames, cropsize, offset)?;

    let mut padded = Array3::<f32>::zeros((channels, bins, layout.padded_width()));
    padded
        .slice_mut(s![.., .., layout.pad_left..layout.pad_left + frames])
        .assign(&input);

    Ok(Tiler { padded, layout })
}

impl Tiler {
    /// Number of crops
    pub fn len(&self) -> usize {
        self.layout.num_crops
    }

    pub fn is_empty(&self) -> bool {
        self.layout.num_crops == 0
    }

    /// Iterate crops left to right; may be called again to restart
    pub fn crops(&self) -> Crops<'_> {
        Crops {
            tiler: self,
            next: 0,
        }
    }

    /// Iterate batches of at most `batchsize` crops
    pub fn batches(&self, batchsize: usize) -> Batches<Crops<'_>> {
        batch(self.crops(), batchsize)
    }
}

/// Lazy, ordered crop sequence over a [`Tiler`]
#[derive(Debug, Clone)]
pub struct Crops<'a> {
    tiler: &'a Tiler,
    next: usize,
}

impl<'a> Iterator for Crops<'a> {
    type Item = Crop<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = &self.tiler.layout;
        if self.next >= layout.num_crops {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let start = index * layout.roi;
        Some(Crop {
            start_frame: start,
            data: self
                .tiler
                .padded
                .slice(s![.., .., start..start + layout.cropsize]),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tiler.layout.num_crops - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Crops<'_> {}

/// Group crops into stacked batches of at most `batchsize`
///
/// The last batch may be smaller. A `batchsize` of zero is treated as one.
pub fn batch<'a, I>(crops: I, batchsize: usize) -> Batches<I>
where
    I: Iterator<Item = Crop<'a>>,
{
    Batches {
        crops,
        batchsize: batchsize.max(1),
    }
}

/// Iterator of stacked `(batch, channels, bins, cropsize)` tensors
#[derive(Debug, Clone)]
pub struct Batches<I> {
    crops: I,
    batchsize: usize,
}

impl<'a, I> Iterator for Batches<I>
where
    I: Iterator<Item = Crop<'a>>,
{
    type Item = Array4<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<Crop<'a>> = self.crops.by_ref().take(self.batchsize).collect();
        let first = group.first()?;
        let (channels, bins, width) = first.data.dim();

        let mut stacked = Array4::<f32>::zeros((group.len(), channels, bins, width));
        for (mut slot, crop) in stacked.axis_iter_mut(Axis(0)).zip(&group) {
            slot.assign(&crop.data);
        }
        Some(stacked)
    }
}

/// Concatenate per-crop predictions in order and truncate to `frames`
///
/// Every item is a batch `(n, channels, bins, roi)`; batch boundaries carry
/// no meaning. Fails if the predictions do not cover `frames`.
pub fn stitch<I>(predictions: I, frames: usize) -> Result<Array3<f32>>
where
    I: IntoIterator<Item = Array4<f32>>,
{
    let mut output: Option<Array3<f32>> = None;
    let mut cursor = 0usize;

    for batch in predictions {
        let (_, channels, bins, width) = batch.dim();
        let out = output.get_or_insert_with(|| Array3::zeros((channels, bins, frames)));
        if out.dim().0 != channels || out.dim().1 != bins {
            return Err(SplitError::inference(format!(
                "prediction shape {:?} is inconsistent with earlier crops {:?}",
                batch.shape(),
                out.shape()
            )));
        }

        for crop in batch.axis_iter(Axis(0)) {
            if cursor >= frames {
                break;
            }
            let take = width.min(frames - cursor);
            out.slice_mut(s![.., .., cursor..cursor + take])
                .assign(&crop.slice(s![.., .., ..take]));
            cursor += take;
        }
    }

    match output {
        Some(out) if cursor == frames => Ok(out),
        _ => Err(SplitError::inference(format!(
            "predictions cover {} of {} frames",
            cursor, frames
        ))),
    }
}

//! vocal-split - Vocal/instrumental separation with a pretrained spectrogram model
//!
//! Splits a music recording into an instrumental and a vocal track. The
//! recording is converted to a stereo spectrogram, cut into fixed-width
//! crops for a neural mask model, and the predicted instrumental mask is
//! applied to the original complex spectrogram before inverting both
//! outputs back to audio.
//!
//! # Architecture
//!
//! - `separation`: STFT codec, tiling, inference, TTA, postprocessing and
//!   the `Separator` that composes them; model file management and the
//!   ONNX backend (feature `onnx`)
//! - `config`: CLI argument parsing, runtime settings, separation parameters
//! - `audio`: Decoding with symphonia, WAV output with hound
//! - `discovery`: Input file scanning
//! - `pipeline`: Per-file orchestration with progress reporting
//! - `export`: Output naming and the JSON run manifest
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vocal_split::config::SeparationConfig;
//! use vocal_split::separation::{MaskModel, Separator};
//! use vocal_split::types::Waveform;
//!
//! fn split(model: Arc<dyn MaskModel>, waveform: &Waveform) -> vocal_split::Result<()> {
//!     let separator = Separator::new(model, SeparationConfig::default())?;
//!     let separation = separator.separate_waveform(waveform)?;
//!     println!("{} vocal samples", separation.vocals.len());
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod retry;
pub mod separation;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, SplitError};
pub use separation::{separate, MaskModel, ModelContract, Separator};
pub use types::{Separation, Spectrogram, Waveform};

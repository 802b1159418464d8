//! CLI argument parsing and configuration

use crate::config::separation::{DEFAULT_BATCHSIZE, DEFAULT_CROPSIZE, DEFAULT_SAMPLE_RATE};
use crate::separation::inference::InputLayout;
use crate::separation::stft::{DEFAULT_HOP_LENGTH, DEFAULT_N_FFT};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// vocal-split - Separate music into instrumental and vocal tracks
///
/// Runs a pretrained spectrogram mask model over each input file and writes
/// an instrumental and a vocal WAV next to each other in the output directory.
#[derive(Parser, Debug)]
#[command(name = "vocal-split")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input path (file or directory)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory (instrumentals/ and vocals/ are created inside)
    #[arg(short, long, value_name = "DIR", default_value = "separated")]
    pub output: PathBuf,

    /// Path to the ONNX separation model
    #[arg(long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// URL to download the model from when no local copy is found
    #[arg(long, value_name = "URL")]
    pub model_url: Option<String>,

    /// Expected SHA-256 of the model file (hex)
    #[arg(long, value_name = "HEX")]
    pub model_sha256: Option<String>,

    /// Tensor layout the model was exported with
    #[arg(long, value_enum, default_value_t = LayoutArg::Magnitude)]
    pub input_layout: LayoutArg,

    /// Sample rate the model expects
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// FFT window size (must match the model)
    #[arg(long, default_value_t = DEFAULT_N_FFT)]
    pub n_fft: usize,

    /// Hop length between STFT frames
    #[arg(long, default_value_t = DEFAULT_HOP_LENGTH)]
    pub hop_length: usize,

    /// Crops per inference batch
    #[arg(short, long, default_value_t = DEFAULT_BATCHSIZE)]
    pub batchsize: usize,

    /// Crop width in frames (must match the model)
    #[arg(short, long, default_value_t = DEFAULT_CROPSIZE)]
    pub cropsize: usize,

    /// Context frames per crop side that the model does not predict
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Refine the instrumental with a soft vocal mask (experimental)
    #[arg(short, long, default_value = "false")]
    pub postprocess: bool,

    /// Test-time augmentation: average a second, time-shifted pass
    #[arg(short, long, default_value = "false")]
    pub tta: bool,

    /// Run inference on the platform accelerator (CoreML, DirectML or CUDA)
    #[arg(long, default_value = "false")]
    pub accelerator: bool,

    /// Inference threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Scan subdirectories recursively
    #[arg(short, long, default_value = "false")]
    pub recursive: bool,

    /// Overwrite existing outputs (by default, skips already-separated files)
    #[arg(long, default_value = "false")]
    pub force: bool,

    /// Write a JSON manifest of the run
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

/// `--input-layout` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// Two channels of magnitudes
    Magnitude,
    /// Real parts then imaginary parts (four channels)
    RealImag,
}

impl From<LayoutArg> for InputLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Magnitude => InputLayout::Magnitude,
            LayoutArg::RealImag => InputLayout::RealImag,
        }
    }
}

impl Cli {
    /// Get the log filter based on verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

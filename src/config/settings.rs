//! Runtime configuration settings

use crate::config::cli::Cli;
use crate::config::separation::{Device, SeparationConfig};
use crate::error::{Result, SplitError};
use crate::separation::inference::{InputLayout, ModelContract};
use crate::separation::model::ModelSource;
use std::path::PathBuf;

/// Runtime settings for the separation pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Input path (file or directory)
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Where to find or fetch the model
    pub model: ModelSource,
    /// Model input tensor layout
    pub layout: InputLayout,
    /// Context frames per crop side
    pub offset: usize,
    /// Separation parameters
    pub separation: SeparationConfig,
    /// Inference device
    pub device: Device,
    /// Number of inference threads
    pub threads: usize,
    /// Scan recursively
    pub recursive: bool,
    /// Overwrite existing outputs
    pub force: bool,
    /// Write the JSON manifest
    pub output_json: bool,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        let default_threads = num_cpus::get().saturating_sub(1).max(1);

        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            model: ModelSource {
                path: cli.model.clone(),
                url: cli.model_url.clone(),
                sha256: cli.model_sha256.clone(),
            },
            layout: cli.input_layout.into(),
            offset: cli.offset,
            separation: SeparationConfig {
                sample_rate: cli.sample_rate,
                n_fft: cli.n_fft,
                hop_length: cli.hop_length,
                batchsize: cli.batchsize,
                cropsize: cli.cropsize,
                postprocess: cli.postprocess,
                tta: cli.tta,
                tta_shift: None,
            },
            device: if cli.accelerator {
                Device::Accelerator
            } else {
                Device::Cpu
            },
            threads: cli.threads.unwrap_or(default_threads).max(1),
            recursive: cli.recursive,
            force: cli.force,
            output_json: cli.json,
            show_progress: !cli.quiet,
        }
    }

    /// Check the settings before any file is touched
    pub fn validate(&self) -> Result<()> {
        self.separation.validate()?;
        if self.separation.cropsize <= 2 * self.offset {
            return Err(SplitError::Configuration(format!(
                "cropsize {} must exceed twice the offset {}",
                self.separation.cropsize, self.offset
            )));
        }
        Ok(())
    }

    /// Tensor contract the configured model is expected to follow
    pub fn model_contract(&self) -> ModelContract {
        ModelContract::new(self.separation.frequency_bins())
            .with_offset(self.offset)
            .with_layout(self.layout)
    }

    /// Directory instrumental outputs are written to
    pub fn instrumentals_dir(&self) -> PathBuf {
        self.output.join("instrumentals")
    }

    /// Directory vocal outputs are written to
    pub fn vocals_dir(&self) -> PathBuf {
        self.output.join("vocals")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("./separated"),
            model: ModelSource::default(),
            layout: InputLayout::default(),
            offset: 0,
            separation: SeparationConfig::default(),
            device: Device::Cpu,
            threads: num_cpus::get().saturating_sub(1).max(1),
            recursive: false,
            force: false,
            output_json: false,
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli() {
        let cli = Cli::parse_from([
            "vocal-split", "-i", "music", "-o", "out", "--n-fft", "1024", "--hop-length", "256",
            "--offset", "32", "--accelerator", "-j", "3", "--model-url", "https://host/m.onnx",
        ]);
        let settings = Settings::from_cli(&cli);
        assert_eq!(settings.separation.n_fft, 1024);
        assert_eq!(settings.separation.hop_length, 256);
        assert_eq!(settings.device, Device::Accelerator);
        assert_eq!(settings.threads, 3);
        assert_eq!(settings.model.url.as_deref(), Some("https://host/m.onnx"));
        assert_eq!(settings.instrumentals_dir(), PathBuf::from("out/instrumentals"));

        let contract = settings.model_contract();
        assert_eq!(contract.frequency_bins, 513);
        assert_eq!(contract.offset, 32);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_offset_must_fit_crop() {
        let settings = Settings {
            offset: 128,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SplitError::Configuration(_))));
    }
}

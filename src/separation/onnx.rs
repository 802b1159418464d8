//! ONNX Runtime backed mask model
//!
//! Loads an exported separation network once and runs it for every batch.
//! The session needs `&mut` to run, so it lives behind a `Mutex`; batches
//! are processed one at a time.

use crate::config::Device;
use crate::error::{Result, SplitError};
use crate::separation::inference::{MaskModel, ModelContract};
use ndarray::{Array4, ArrayView4};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Mask model running an ONNX graph
pub struct OnnxMaskModel {
    session: Mutex<Session>,
    contract: ModelContract,
    input_name: String,
}

impl OnnxMaskModel {
    /// Load the model at `path`
    ///
    /// `contract` describes the tensors the artifact was exported with. If
    /// the graph declares a static crop width it is recorded in the contract;
    /// static channel or bin dimensions that disagree are rejected.
    pub fn load(
        path: &Path,
        contract: ModelContract,
        device: Device,
        threads: usize,
    ) -> Result<Self> {
        let execution_provider = Self::provider_name(device);
        let session = Self::create_session(path, device, threads)?;

        let input = session.inputs.first().ok_or_else(|| SplitError::ModelUnavailable {
            reason: "Model has no input tensors defined".to_string(),
        })?;
        let input_name = input.name.clone();

        let declared: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let contract = Self::reconcile(contract, &declared)?;

        info!(
            "ONNX model loaded with {} provider: {} (input '{}', shape {:?})",
            execution_provider,
            path.display(),
            input_name,
            declared
        );

        Ok(Self {
            session: Mutex::new(session),
            contract,
            input_name,
        })
    }

    /// Check the declared input shape `(batch, channels, bins, width)` against
    /// the configured contract; dynamic dimensions are negative
    fn reconcile(mut contract: ModelContract, declared: &[i64]) -> Result<ModelContract> {
        if declared.is_empty() {
            return Ok(contract);
        }
        if declared.len() != 4 {
            return Err(SplitError::Configuration(format!(
                "model input must be 4D (batch, channels, bins, width), got {:?}",
                declared
            )));
        }

        let channels = contract.layout.channels() as i64;
        if declared[1] > 0 && declared[1] != channels {
            return Err(SplitError::Configuration(format!(
                "model expects {} input channels, the {:?} layout gives {}",
                declared[1], contract.layout, channels
            )));
        }
        if declared[2] > 0 && declared[2] != contract.frequency_bins as i64 {
            return Err(SplitError::Configuration(format!(
                "model expects {} frequency bins, configuration gives {}",
                declared[2], contract.frequency_bins
            )));
        }
        if declared[3] > 0 {
            contract.crop_width = Some(declared[3] as usize);
        }
        Ok(contract)
    }

    fn create_session(path: &Path, device: Device, threads: usize) -> Result<Session> {
        use ort::execution_providers::CPUExecutionProvider;

        fn unavailable(what: &str, e: impl std::fmt::Display) -> SplitError {
            SplitError::ModelUnavailable {
                reason: format!("{}: {}", what, e),
            }
        }

        let builder = Session::builder()
            .map_err(|e| unavailable("Failed to create ORT session builder", e))?
            .with_intra_threads(threads.max(1))
            .map_err(|e| unavailable("Failed to set thread count", e))?;

        let builder = match device {
            Device::Cpu => builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(|e| unavailable("Failed to configure CPU provider", e))?,
            Device::Accelerator => builder
                .with_execution_providers([
                    Self::accelerator_provider(),
                    CPUExecutionProvider::default().build(),
                ])
                .map_err(|e| unavailable("Failed to configure accelerator", e))?,
        };

        builder
            .commit_from_file(path)
            .map_err(|e| unavailable("Failed to load model", e))
    }

    #[cfg(target_os = "macos")]
    fn accelerator_provider() -> ort::execution_providers::ExecutionProviderDispatch {
        ort::execution_providers::CoreMLExecutionProvider::default().build()
    }

    #[cfg(target_os = "windows")]
    fn accelerator_provider() -> ort::execution_providers::ExecutionProviderDispatch {
        ort::execution_providers::DirectMLExecutionProvider::default().build()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn accelerator_provider() -> ort::execution_providers::ExecutionProviderDispatch {
        ort::execution_providers::CUDAExecutionProvider::default().build()
    }

    #[allow(clippy::needless_return)] // Returns needed due to cfg conditional compilation
    fn provider_name(device: Device) -> &'static str {
        if device == Device::Cpu {
            return "CPU";
        }

        #[cfg(target_os = "macos")]
        {
            return "CoreML";
        }

        #[cfg(target_os = "windows")]
        {
            return "DirectML";
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        "CUDA"
    }
}

impl MaskModel for OnnxMaskModel {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        use ort::value::Tensor;

        let mut session = self
            .session
            .lock()
            .map_err(|_| SplitError::inference("Failed to acquire session lock"))?;

        // ort needs an owned, contiguous array
        let input_tensor = Tensor::from_array(batch.to_owned())
            .map_err(|e| SplitError::inference(format!("Failed to create input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| SplitError::inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| SplitError::inference("No output tensor from model"))?;

        let (output_shape, output_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| SplitError::inference(format!("Failed to extract output tensor: {}", e)))?;

        let shape: Vec<i64> = output_shape.iter().copied().collect();
        if shape.len() != 4 || shape.iter().any(|&d| d < 0) {
            return Err(SplitError::inference(format!(
                "Expected 4D output tensor with known dimensions, got {:?}",
                shape
            )));
        }
        let dims = (
            shape[0] as usize,
            shape[1] as usize,
            shape[2] as usize,
            shape[3] as usize,
        );

        debug!("ONNX output shape {:?}", shape);

        Array4::from_shape_vec(dims, output_data.to_vec()).map_err(|e| {
            SplitError::inference(format!(
                "Output buffer length {} doesn't match shape {:?}: {}",
                output_data.len(),
                shape,
                e
            ))
        })
    }

    fn contract(&self) -> &ModelContract {
        &self.contract
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

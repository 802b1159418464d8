//! Per-file separation pipeline

pub mod orchestrator;

pub use orchestrator::{load_model, run, run_with_model, PipelineResult};

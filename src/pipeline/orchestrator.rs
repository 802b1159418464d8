//! Pipeline orchestration
//!
//! Coordinates model loading, file discovery, separation and export.
//! Files are processed one after another; the model is shared by all of
//! them and never reloaded.

use crate::audio;
use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{Result, SplitError};
use crate::export;
use crate::separation::{MaskModel, Separator};
use crate::types::{OutputPaths, SeparatedTrack};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline result summary
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Tracks separated in this run
    pub tracks: Vec<SeparatedTrack>,
}

/// Run the full pipeline, loading the model described by `settings`
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    settings.validate()?;
    let model = load_model(settings)?;
    run_with_model(settings, model)
}

/// Resolve and load the ONNX model
#[cfg(feature = "onnx")]
pub fn load_model(settings: &Settings) -> Result<Arc<dyn MaskModel>> {
    use crate::retry::RetryPolicy;
    use crate::separation::model::resolve_model;
    use crate::separation::onnx::OnnxMaskModel;

    let path = resolve_model(&settings.model, &RetryPolicy::default())?;
    let model = OnnxMaskModel::load(
        &path,
        settings.model_contract(),
        settings.device,
        settings.threads,
    )?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
pub fn load_model(_settings: &Settings) -> Result<Arc<dyn MaskModel>> {
    Err(SplitError::backend_disabled())
}

/// Run the pipeline with an already loaded model
pub fn run_with_model(settings: &Settings, model: Arc<dyn MaskModel>) -> Result<PipelineResult> {
    let pipeline_start = Instant::now();

    // Configuration problems surface before any file is touched
    settings.validate()?;
    let separator = Separator::new(model.clone(), settings.separation.clone())?;

    info!("Scanning for audio files...");
    let files = discovery::scan(&settings.input, settings.recursive, Some(&settings.output))?;

    if files.is_empty() {
        return Ok(PipelineResult::default());
    }

    let suffix = settings.separation.output_suffix();
    let instrumentals_dir = settings.instrumentals_dir();
    let vocals_dir = settings.vocals_dir();

    let jobs: Vec<(DiscoveredFile, OutputPaths)> = files
        .into_iter()
        .map(|file| {
            let outputs =
                export::output_paths(&file.path, &instrumentals_dir, &vocals_dir, &suffix);
            (file, outputs)
        })
        .collect();

    let total_files = jobs.len();
    let (to_process, already_done): (Vec<_>, Vec<_>) = jobs
        .into_iter()
        .partition(|(_, outputs)| settings.force || !outputs.exist());

    if !already_done.is_empty() {
        info!(
            "Skipping {} already-separated files (use --force to re-separate)",
            already_done.len()
        );
    }

    let mut result = PipelineResult {
        total_files,
        skipped: already_done.len(),
        ..Default::default()
    };

    let progress_bar = if settings.show_progress && !to_process.is_empty() {
        let pb = ProgressBar::new(to_process.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    for (file, outputs) in &to_process {
        if let Some(ref pb) = progress_bar {
            pb.set_message(
                file.path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string(),
            );
        }

        match separate_file(&separator, file, outputs, settings) {
            Ok(track) => {
                result.successful += 1;
                result.tracks.push(track);
            }
            Err(e) if e.is_fatal() => {
                if let Some(ref pb) = progress_bar {
                    pb.abandon_with_message("Aborted");
                }
                return Err(e);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Skipping {}: {}", file.path.display(), e);
                result.skipped += 1;
            }
            Err(e) => {
                error!("Failed {}: {}", file.path.display(), e);
                result.failed += 1;
            }
        }

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Separation complete");
    }

    if settings.output_json {
        let existing = previous_entries(settings, &already_done);
        export_manifest(settings, model.name(), existing, &result.tracks)?;
    }

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(result)
}

/// Decode, separate and write one file
fn separate_file(
    separator: &Separator,
    file: &DiscoveredFile,
    outputs: &OutputPaths,
    settings: &Settings,
) -> Result<SeparatedTrack> {
    let start = Instant::now();
    debug!("Separating: {}", file.path.display());

    let waveform = audio::decode(&file.path, settings.separation.sample_rate)?;
    let separation = separator.separate_waveform(&waveform)?;

    audio::write_wav(&outputs.instrumental, &separation.instrumental)?;
    audio::write_wav(&outputs.vocals, &separation.vocals)?;

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "Separated {} in {:.2}s",
        file.path.file_name().unwrap_or_default().to_string_lossy(),
        elapsed
    );

    Ok(SeparatedTrack {
        path: file.path.clone(),
        outputs: outputs.clone(),
        duration_seconds: waveform.duration(),
        sample_rate: waveform.sample_rate(),
        elapsed_seconds: elapsed,
        separated_at: chrono::Utc::now(),
    })
}

/// Manifest entries of a previous run for files skipped in this one
fn previous_entries(
    settings: &Settings,
    skipped: &[(DiscoveredFile, OutputPaths)],
) -> Vec<SeparatedTrack> {
    if skipped.is_empty() {
        return Vec::new();
    }
    let json_path = settings.output.join(export::MANIFEST_FILENAME);
    export::read_existing_tracks(&json_path)
        .into_iter()
        .filter(|track| skipped.iter().any(|(file, _)| file.path == track.path))
        .collect()
}

fn export_manifest(
    settings: &Settings,
    model_name: &str,
    mut tracks: Vec<SeparatedTrack>,
    new_tracks: &[SeparatedTrack],
) -> Result<()> {
    std::fs::create_dir_all(&settings.output)
        .map_err(|e| SplitError::output_error(&settings.output, e))?;

    tracks.extend_from_slice(new_tracks);
    tracks.sort_by(|a, b| a.path.cmp(&b.path));

    let json_path = settings.output.join(export::MANIFEST_FILENAME);
    export::write_manifest(&tracks, &settings.separation, model_name, &json_path)
}

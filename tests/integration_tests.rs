//! Integration tests for the vocal-split pipeline
//!
//! A small deterministic mask model stands in for the neural network, so the
//! tests exercise the real STFT, tiling, file I/O and export paths.

use ndarray::{s, Array4, ArrayView4};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vocal_split::config::{SeparationConfig, Settings};
use vocal_split::pipeline;
use vocal_split::separation::{MaskModel, ModelContract, Separator};
use vocal_split::types::Waveform;
use vocal_split::SplitError;

/// Predicts `m / (m + 1)` of each input magnitude inside the crop centre
struct SoftRatioModel {
    contract: ModelContract,
}

impl SoftRatioModel {
    fn new(n_fft: usize) -> Self {
        Self {
            contract: ModelContract::new(n_fft / 2 + 1),
        }
    }
}

impl MaskModel for SoftRatioModel {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> vocal_split::Result<Array4<f32>> {
        let offset = self.contract.offset;
        let width = batch.dim().3;
        Ok(batch
            .slice(s![.., .., .., offset..width - offset])
            .mapv(|m| m.abs() / (m.abs() + 1.0)))
    }

    fn contract(&self) -> &ModelContract {
        &self.contract
    }

    fn name(&self) -> &'static str {
        "soft-ratio"
    }
}

/// Generate a sine wave WAV file for testing
///
/// Creates a 16-bit WAV file with a slightly different tone per channel.
fn generate_sine_wav(path: &Path, channels: u16, duration_secs: f32, sample_rate: u32) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        for ch in 0..channels {
            let frequency = 440.0 + 220.0 * ch as f32;
            let sample = (2.0 * PI * frequency * t).sin() * 0.5;
            writer
                .write_sample((sample * 32767.0) as i16)
                .expect("Failed to write sample");
        }
    }

    writer.finalize().expect("Failed to finalize WAV");
}

fn sine_waveform(duration_secs: f32, sample_rate: u32) -> Waveform {
    use std::f32::consts::PI;
    let len = (duration_secs * sample_rate as f32) as usize;
    let tone = |freq: f32| -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    };
    Waveform::stereo(tone(440.0), tone(554.37), sample_rate)
}

/// Create test settings with progress bars disabled
fn create_test_settings(input: &Path, output: &Path) -> Settings {
    Settings {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        recursive: true,
        output_json: true,
        show_progress: false,
        threads: 1,
        ..Default::default()
    }
}

fn model() -> Arc<dyn MaskModel> {
    Arc::new(SoftRatioModel::new(2048))
}

fn wav_info(path: &Path) -> (u16, u32) {
    let reader = hound::WavReader::open(path).expect("Failed to open output WAV");
    (reader.spec().channels, reader.duration())
}

#[test]
fn test_end_to_end_two_second_stereo() {
    let input = sine_waveform(2.0, 44100);
    let config = SeparationConfig {
        sample_rate: 44100,
        n_fft: 2048,
        hop_length: 1024,
        batchsize: 4,
        cropsize: 256,
        postprocess: false,
        tta: false,
        tta_shift: None,
    };

    let separator = Separator::new(model(), config).unwrap();
    let separation = separator.separate_waveform(&input).unwrap();

    for output in [&separation.instrumental, &separation.vocals] {
        assert_eq!(output.channels(), 2);
        assert!((output.len() as i64 - input.len() as i64).abs() <= 2048);
        assert!(output.samples().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_library_entry_point_matches_separator() {
    let input = sine_waveform(0.5, 44100);
    let config = SeparationConfig {
        tta: true,
        postprocess: true,
        ..Default::default()
    };
    let separation = vocal_split::separate(&input, model(), config).unwrap();
    assert_eq!(separation.instrumental.len(), input.len());
    assert_eq!(separation.vocals.len(), input.len());
}

#[test]
fn test_separators_share_one_model() {
    let shared = model();
    let plain = Separator::new(shared.clone(), SeparationConfig::default()).unwrap();
    let augmented = Separator::new(
        shared,
        SeparationConfig {
            tta: true,
            batchsize: 1,
            ..Default::default()
        },
    )
    .unwrap();

    let input = sine_waveform(0.3, 44100);
    assert!(plain.separate_waveform(&input).is_ok());
    assert!(augmented.separate_waveform(&input).is_ok());
}

#[test]
fn test_pipeline_writes_both_outputs() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("song.wav"), 2, 1.0, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run_with_model(&settings, model()).unwrap();

    assert_eq!(result.total_files, 1);
    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 0);

    let instrumental = output_dir.path().join("instrumentals").join("song.wav");
    let vocals = output_dir.path().join("vocals").join("song.wav");
    assert_eq!(wav_info(&instrumental), (2, 44100));
    assert_eq!(wav_info(&vocals), (2, 44100));
}

#[test]
fn test_pipeline_writes_manifest() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("a.wav"), 2, 0.5, 44100);
    generate_sine_wav(&input_dir.path().join("b.wav"), 2, 0.5, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    pipeline::run_with_model(&settings, model()).unwrap();

    let json_content = fs::read_to_string(output_dir.path().join("vocal-split.json"))
        .expect("Failed to read JSON");
    let json: serde_json::Value = serde_json::from_str(&json_content).unwrap();

    assert_eq!(json["version"], "1.0");
    assert_eq!(json["metadata"]["model"], "soft-ratio");
    assert_eq!(json["metadata"]["track_count"], 2);
    let tracks = json["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["sample_rate"], 44100);
    assert!(tracks[0]["outputs"]["vocals"]
        .as_str()
        .unwrap()
        .ends_with("a.wav"));
}

#[test]
fn test_pipeline_skips_existing_outputs_unless_forced() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("song.wav"), 2, 0.5, 44100);

    let mut settings = create_test_settings(input_dir.path(), output_dir.path());
    let first = pipeline::run_with_model(&settings, model()).unwrap();
    assert_eq!(first.successful, 1);

    let second = pipeline::run_with_model(&settings, model()).unwrap();
    assert_eq!(second.successful, 0);
    assert_eq!(second.skipped, 1);

    // The skipped track keeps its manifest entry
    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(output_dir.path().join("vocal-split.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["tracks"].as_array().unwrap().len(), 1);

    settings.force = true;
    let forced = pipeline::run_with_model(&settings, model()).unwrap();
    assert_eq!(forced.successful, 1);
    assert_eq!(forced.skipped, 0);
}

#[test]
fn test_option_suffixes_in_output_names() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("song.wav"), 2, 0.5, 44100);

    let mut settings = create_test_settings(input_dir.path(), output_dir.path());
    settings.separation.tta = true;
    settings.separation.postprocess = true;
    pipeline::run_with_model(&settings, model()).unwrap();

    assert!(output_dir
        .path()
        .join("instrumentals")
        .join("song.tta.postprocess.wav")
        .exists());
    assert!(output_dir
        .path()
        .join("vocals")
        .join("song.tta.postprocess.wav")
        .exists());
}

#[test]
fn test_mono_input_gives_mono_outputs() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("mono.wav"), 1, 0.5, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    pipeline::run_with_model(&settings, model()).unwrap();

    let (channels, frames) = wav_info(&output_dir.path().join("vocals").join("mono.wav"));
    assert_eq!(channels, 1);
    assert_eq!(frames, 22050);
}

#[test]
fn test_input_is_resampled_to_model_rate() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("low.wav"), 2, 0.5, 22050);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    pipeline::run_with_model(&settings, model()).unwrap();

    let reader =
        hound::WavReader::open(output_dir.path().join("instrumentals").join("low.wav")).unwrap();
    assert_eq!(reader.spec().sample_rate, 44100);
}

#[test]
fn test_pipeline_handles_empty_directory() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run_with_model(&settings, model()).unwrap();

    assert_eq!(result.total_files, 0);
    assert_eq!(result.successful, 0);
    assert!(!output_dir.path().join("vocal-split.json").exists());
}

#[test]
fn test_invalid_audio_is_skipped() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    fs::write(input_dir.path().join("broken.wav"), b"definitely not a wav file").unwrap();
    generate_sine_wav(&input_dir.path().join("good.wav"), 2, 0.5, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run_with_model(&settings, model()).unwrap();

    assert_eq!(result.total_files, 2);
    assert_eq!(result.successful, 1);
    assert_eq!(result.skipped, 1);
    assert!(output_dir.path().join("vocals").join("good.wav").exists());
    assert!(!output_dir.path().join("vocals").join("broken.wav").exists());
}

#[test]
fn test_outputs_inside_input_tree_are_not_rescanned() {
    let input_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("song.wav"), 2, 0.5, 44100);
    let output = input_dir.path().join("separated");

    let mut settings = create_test_settings(input_dir.path(), &output);
    pipeline::run_with_model(&settings, model()).unwrap();

    settings.force = true;
    let rerun = pipeline::run_with_model(&settings, model()).unwrap();
    assert_eq!(rerun.total_files, 1);
}

#[test]
fn test_model_mismatch_fails_before_processing() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("song.wav"), 2, 0.5, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let wrong_model: Arc<dyn MaskModel> = Arc::new(SoftRatioModel::new(1024));
    let err = pipeline::run_with_model(&settings, wrong_model).unwrap_err();

    assert!(matches!(err, SplitError::Configuration(_)));
    assert!(!output_dir.path().join("vocals").exists());
}

#[test]
fn test_handles_nonexistent_input_gracefully() {
    let output_dir = TempDir::new().unwrap();
    let settings = create_test_settings(Path::new("/nonexistent/path/to/audio"), output_dir.path());

    let result = pipeline::run_with_model(&settings, model());
    assert!(matches!(result, Err(SplitError::FileNotFound(_))));
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_run_without_backend_reports_unavailable_model() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let settings = create_test_settings(input_dir.path(), output_dir.path());

    assert!(matches!(
        pipeline::run(&settings),
        Err(SplitError::ModelUnavailable { .. })
    ));
}

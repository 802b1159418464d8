//! Separation model file management
//!
//! Resolves the ONNX model artifact on disk, downloading it into the cache
//! when a URL is configured. Resolution checks several common locations.

use crate::error::{Result, SplitError};
use crate::retry::RetryPolicy;
use directories::ProjectDirs;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filename the model is cached under
pub const DEFAULT_MODEL_FILENAME: &str = "baseline.onnx";

/// Environment variable overriding the model location
pub const MODEL_PATH_ENV: &str = "VOCAL_SPLIT_MODEL_PATH";

/// Where the model artifact comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSource {
    /// Explicit model path (--model)
    pub path: Option<PathBuf>,
    /// Download URL used when no local copy exists (--model-url)
    pub url: Option<String>,
    /// Expected SHA-256 of the model file, hex encoded
    pub sha256: Option<String>,
}

impl ModelSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Check for user-provided model path via environment variable
pub fn get_user_model_path() -> Option<PathBuf> {
    std::env::var(MODEL_PATH_ENV).ok().map(PathBuf::from)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vocal-split", "vocal-split")
}

/// Locations searched for a model, in order
///
/// 1. VOCAL_SPLIT_MODEL_PATH environment variable
/// 2. ProjectDirs cache: ~/.cache/vocal-split/models/ (Linux)
/// 3. ProjectDirs data: ~/.local/share/vocal-split/models/ (Linux XDG)
/// 4. Current directory: ./models/
/// 5. Home directory: ~/vocal-split/models/
pub fn candidate_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(env_path) = get_user_model_path() {
        locations.push(env_path);
    }
    if let Some(dirs) = project_dirs() {
        locations.push(dirs.cache_dir().join("models").join(DEFAULT_MODEL_FILENAME));
        locations.push(dirs.data_dir().join("models").join(DEFAULT_MODEL_FILENAME));
    }
    locations.push(PathBuf::from("./models").join(DEFAULT_MODEL_FILENAME));
    if let Some(base_dirs) = directories::BaseDirs::new() {
        locations.push(
            base_dirs
                .home_dir()
                .join("vocal-split")
                .join("models")
                .join(DEFAULT_MODEL_FILENAME),
        );
    }

    locations
}

/// First existing path among `candidates`
pub fn find_in(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.is_file()).cloned()
}

/// Get the model cache directory, creating it if needed
pub fn get_cache_dir() -> Result<PathBuf> {
    let dirs = project_dirs().ok_or_else(|| {
        SplitError::Configuration("Could not determine cache directory".to_string())
    })?;

    let cache_dir = dirs.cache_dir().join("models");
    fs::create_dir_all(&cache_dir).map_err(|e| SplitError::Output {
        path: cache_dir.clone(),
        reason: format!("Failed to create cache directory: {}", e),
    })?;

    Ok(cache_dir)
}

/// Resolve `source` to a verified model file on disk
pub fn resolve_model(source: &ModelSource, retry: &RetryPolicy) -> Result<PathBuf> {
    resolve_from(source, &candidate_locations(), retry, get_cache_dir)
}

/// Resolution against explicit candidates and download directory
fn resolve_from<F>(
    source: &ModelSource,
    candidates: &[PathBuf],
    retry: &RetryPolicy,
    cache_dir: F,
) -> Result<PathBuf>
where
    F: FnOnce() -> Result<PathBuf>,
{
    let expected = source.sha256.as_deref();

    // An explicit path is authoritative; never fall back to other locations
    if let Some(path) = &source.path {
        if !path.is_file() {
            return Err(SplitError::ModelUnavailable {
                reason: format!("model file '{}' does not exist", path.display()),
            });
        }
        if let Some(hash) = expected {
            if !verify_model_hash(path, hash)? {
                return Err(SplitError::ModelUnavailable {
                    reason: format!("model file '{}' failed hash verification", path.display()),
                });
            }
        }
        return Ok(path.clone());
    }

    if let Some(found) = find_in(candidates) {
        match expected {
            Some(hash) if !verify_model_hash(&found, hash)? => {
                warn!("Model at {} does not match the expected hash", found.display());
            }
            _ => {
                debug!("Using model at {}", found.display());
                return Ok(found);
            }
        }
    }

    match &source.url {
        Some(url) => {
            let dest = cache_dir()?.join(DEFAULT_MODEL_FILENAME);
            info!("Model not found locally, downloading from {}", url);
            retry.run("Model download", |_| download_model(url, &dest, expected))?;
            Ok(dest)
        }
        None => {
            let locations = candidates
                .iter()
                .map(|loc| format!("  - {}", loc.display()))
                .collect::<Vec<_>>()
                .join("\n");
            Err(SplitError::ModelUnavailable {
                reason: format!("no model found.\n\n  Locations checked:\n{}", locations),
            })
        }
    }
}

/// Download the model from `url` into `dest` with a progress indicator
///
/// The file is written next to `dest` and renamed once complete and
/// verified, so an interrupted download never leaves a truncated model.
pub fn download_model(url: &str, dest: &Path, expected_sha256: Option<&str>) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let response = reqwest::blocking::get(url).map_err(|e| SplitError::ModelDownload {
        reason: format!("Failed to download model: {}", e),
    })?;

    if !response.status().is_success() {
        return Err(SplitError::ModelDownload {
            reason: format!("Model download failed with status: {}", response.status()),
        });
    }

    let pb = match response.content_length() {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("Downloading separation model...");

    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial).map_err(|e| SplitError::output_error(&partial, e))?;

    let mut downloaded: u64 = 0;
    let mut reader = response;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| SplitError::ModelDownload {
            reason: format!("Failed to read model data: {}", e),
        })?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| SplitError::output_error(&partial, e))?;

        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }
    file.flush().map_err(|e| SplitError::output_error(&partial, e))?;
    drop(file);

    pb.finish_with_message("Download complete!");

    if let Some(hash) = expected_sha256 {
        if !verify_model_hash(&partial, hash)? {
            fs::remove_file(&partial).ok();
            return Err(SplitError::ModelDownload {
                reason: "Downloaded model hash verification failed".to_string(),
            });
        }
    }

    fs::rename(&partial, dest).map_err(|e| SplitError::output_error(dest, e))?;
    info!("Model downloaded to {}", dest.display());
    Ok(())
}

/// Hex-encoded SHA-256 of a file
pub fn file_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = fs::File::open(path).map_err(|e| SplitError::ModelUnavailable {
        reason: format!("Failed to open model '{}': {}", path.display(), e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the SHA-256 hash of a model file (case-insensitive hex)
pub fn verify_model_hash(path: &Path, expected_hash: &str) -> Result<bool> {
    let actual_hash = file_sha256(path)?;
    let matches = actual_hash.eq_ignore_ascii_case(expected_hash.trim());

    if !matches {
        warn!(
            "Model hash mismatch: expected {}, got {}",
            expected_hash, actual_hash
        );
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn hash_of(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(bytes))
    }

    fn write_model(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn no_cache() -> Result<PathBuf> {
        Err(SplitError::Configuration("no cache in tests".to_string()))
    }

    #[test]
    fn test_verify_model_hash() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "m.onnx", b"model-bytes");
        let hash = hash_of(b"model-bytes");
        assert!(verify_model_hash(&path, &hash).unwrap());
        assert!(verify_model_hash(&path, &hash.to_uppercase()).unwrap());
        assert!(!verify_model_hash(&path, &hash_of(b"other")).unwrap());
    }

    #[test]
    fn test_explicit_path_is_used() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "custom.onnx", b"weights");
        let source = ModelSource {
            sha256: Some(hash_of(b"weights")),
            ..ModelSource::from_path(&path)
        };
        let resolved = resolve_from(&source, &[], &RetryPolicy::none(), no_cache).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_missing_explicit_path_is_fatal() {
        let source = ModelSource::from_path("/nonexistent/model.onnx");
        let err = resolve_from(&source, &[], &RetryPolicy::none(), no_cache).unwrap_err();
        assert!(matches!(err, SplitError::ModelUnavailable { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_explicit_path_hash_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "custom.onnx", b"weights");
        let source = ModelSource {
            sha256: Some(hash_of(b"different")),
            ..ModelSource::from_path(&path)
        };
        assert!(resolve_from(&source, &[], &RetryPolicy::none(), no_cache).is_err());
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let second = write_model(&dir, "second.onnx", b"b");
        let third = write_model(&dir, "third.onnx", b"c");
        let candidates = vec![dir.path().join("missing.onnx"), second.clone(), third];
        let resolved =
            resolve_from(&ModelSource::default(), &candidates, &RetryPolicy::none(), no_cache)
                .unwrap();
        assert_eq!(resolved, second);
    }

    #[test]
    fn test_not_found_lists_locations() {
        let candidates = vec![PathBuf::from("/nonexistent/a.onnx")];
        let err = resolve_from(&ModelSource::default(), &candidates, &RetryPolicy::none(), no_cache)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/a.onnx"));
    }

    #[test]
    fn test_unreachable_url_fails_after_retries() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().to_path_buf();
        let source = ModelSource {
            url: Some("http://127.0.0.1:9/baseline.onnx".to_string()),
            ..Default::default()
        };
        let err = resolve_from(
            &source,
            &[],
            &RetryPolicy::new(2, Duration::ZERO),
            move || Ok(cache),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::ModelDownload { .. }));
        assert!(!dir.path().join(DEFAULT_MODEL_FILENAME).exists());
    }
}

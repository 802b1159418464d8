//! JSON manifest of a separation run

use crate::config::SeparationConfig;
use crate::error::{Result, SplitError};
use crate::types::SeparatedTrack;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Manifest filename inside the output directory
pub const MANIFEST_FILENAME: &str = "vocal-split.json";

/// Top-level manifest structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version for forward compatibility
    pub version: String,
    /// Run metadata
    pub metadata: ManifestMetadata,
    /// Separated tracks
    pub tracks: Vec<SeparatedTrack>,
}

/// Run metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// vocal-split version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
    /// Model backend name
    pub model: String,
    /// Parameters the tracks were separated with
    pub config: SeparationConfig,
    /// Number of tracks
    pub track_count: usize,
}

/// Write the manifest to `output_path`
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_manifest(
    tracks: &[SeparatedTrack],
    config: &SeparationConfig,
    model: &str,
    output_path: &Path,
) -> Result<()> {
    // Same directory, so the rename stays on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| SplitError::Output {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let manifest = Manifest {
        version: SCHEMA_VERSION.to_string(),
        metadata: ManifestMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            model: model.to_string(),
            config: config.clone(),
            track_count: tracks.len(),
        },
        tracks: tracks.to_vec(),
    };

    write_pretty(file, &manifest).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SplitError::Output {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SplitError::Output {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote {} tracks to {}", tracks.len(), output_path.display());

    Ok(())
}

/// Serialize through a buffer and flush it, so late write errors surface
fn write_pretty<W: Write>(sink: W, manifest: &Manifest) -> std::io::Result<()> {
    let mut writer = BufWriter::new(sink);
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer.flush()
}

/// Read the tracks of an existing manifest
///
/// Used to keep entries for files skipped on a re-run. A missing or
/// unreadable manifest yields no tracks.
pub fn read_existing_tracks(json_path: &Path) -> Vec<SeparatedTrack> {
    if !json_path.exists() {
        debug!("No existing manifest at {}", json_path.display());
        return Vec::new();
    }

    let file = match File::open(json_path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Could not open existing manifest: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_reader::<_, Manifest>(BufReader::new(file)) {
        Ok(manifest) => manifest.tracks,
        Err(e) => {
            debug!("Could not parse existing manifest: {}", e);
            Vec::new()
        }
    }
}

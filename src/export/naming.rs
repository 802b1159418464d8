//! Output file naming

use crate::types::OutputPaths;
use std::path::Path;

/// Output paths for `input`
///
/// `<instrumentals_dir>/<stem><suffix>.wav` and
/// `<vocals_dir>/<stem><suffix>.wav`, where `suffix` records the options
/// used (".tta", ".postprocess").
pub fn output_paths(
    input: &Path,
    instrumentals_dir: &Path,
    vocals_dir: &Path,
    suffix: &str,
) -> OutputPaths {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    let filename = format!("{}{}.wav", stem, suffix);

    OutputPaths {
        instrumental: instrumentals_dir.join(&filename),
        vocals: vocals_dir.join(filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_output_paths() {
        let paths = output_paths(
            Path::new("/music/My Song.mp3"),
            Path::new("out/instrumentals"),
            Path::new("out/vocals"),
            ".tta.postprocess",
        );
        assert_eq!(
            paths.instrumental,
            PathBuf::from("out/instrumentals/My Song.tta.postprocess.wav")
        );
        assert_eq!(paths.vocals, PathBuf::from("out/vocals/My Song.tta.postprocess.wav"));
    }

    #[test]
    fn test_output_paths_without_suffix() {
        let paths = output_paths(Path::new("a.b.flac"), Path::new("i"), Path::new("v"), "");
        assert_eq!(paths.instrumental, PathBuf::from("i/a.b.wav"));
        assert!(!paths.exist());
    }
}

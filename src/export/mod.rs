//! Output naming and the JSON run manifest

pub mod json;
pub mod naming;

pub use json::{read_existing_tracks, write_manifest, MANIFEST_FILENAME};
pub use naming::output_paths;

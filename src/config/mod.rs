//! Configuration and CLI handling

pub mod cli;
pub mod separation;
pub mod settings;

pub use cli::Cli;
pub use separation::{Device, SeparationConfig};
pub use settings::Settings;

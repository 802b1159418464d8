//! Audio file input and output

pub mod decoder;
pub mod encoder;

pub use decoder::decode;
pub use encoder::write_wav;

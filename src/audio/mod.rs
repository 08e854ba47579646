//! Audio processing backed by an external conversion tool

pub mod converter;
pub mod format;

pub use converter::{AudioConverter, AudioUpload, ConversionError, ConvertedAudio, FfmpegConverter};
pub use format::{AudioFormat, ConversionOptions};

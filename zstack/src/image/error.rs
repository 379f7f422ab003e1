use std::io;

use thiserror::Error;

/// Errors raised while decoding or encoding slice files.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Image codec error: {0}")]
    Codec(#[from] image_lib::ImageError),

    #[error("Expected an image with 1 or 3 channels, not {channels}")]
    UnsupportedChannelCount { channels: usize },

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Unsupported file extension: '{0}'")]
    InvalidExtension(String),

    #[error("Pixel buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

use std::path::Path;

use super::{io, Error, GrayImage, Result};

/// Reads slice files into single-channel images and writes them back.
///
/// Implementations must release any file handle before returning, on success and on error.
pub trait ImageCodec: Send + Sync {
    /// Decodes `path` at native bit depth. Three-channel input is reduced to
    /// grayscale; any channel count other than 1 or 3 is rejected.
    fn decode(&self, path: &Path) -> Result<GrayImage>;

    /// Writes `image` using its own [`SampleType`](super::SampleType).
    fn encode(&self, image: &GrayImage, path: &Path) -> Result<()>;
}

/// Codec for TIFF, PNG and JPEG files, selected by extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|os_str| os_str.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| Error::InvalidExtension("missing extension".to_string()))
}

impl ImageCodec for FileCodec {
    fn decode(&self, path: &Path) -> Result<GrayImage> {
        let ext = extension(path)?;
        match ext.as_str() {
            "tiff" | "tif" => io::load_tiff(path),
            "png" | "jpeg" | "jpg" => io::load_png_jpeg(path),
            _ => Err(Error::InvalidExtension(ext)),
        }
    }

    fn encode(&self, image: &GrayImage, path: &Path) -> Result<()> {
        let ext = extension(path)?;
        match ext.as_str() {
            "tiff" | "tif" => io::save_tiff(image, path),
            "png" => io::save_png(image, path),
            _ => Err(Error::InvalidExtension(ext)),
        }
    }
}

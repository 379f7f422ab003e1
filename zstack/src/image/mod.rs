//! Single-channel slice images and the codec that reads and writes them.
//!
//! Pixels are held as `f32` for all statistic and normalization math. The
//! [`SampleType`] the file was stored with travels alongside so writes can
//! restore the original representation.

mod codec;
mod error;
mod io;


pub use codec::{FileCodec, ImageCodec};
pub use error::{Error, Result};

use strum_macros::Display;

/// Luma weights applied when a three-channel slice is reduced to grayscale.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Storage type of the samples in a slice file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SampleType {
    U8,
    U16,
    U32,
    F32,
}

impl SampleType {
    pub fn is_integer(self) -> bool {
        !matches!(self, SampleType::F32)
    }

    /// Converts a working value back to this sample type's value range.
    ///
    /// Integer types truncate toward zero and saturate at their bounds; NaN becomes 0.
    /// Precision below one count is intentionally discarded.
    #[inline]
    pub fn quantize(self, value: f32) -> f32 {
        match self {
            SampleType::U8 => value as u8 as f32,
            SampleType::U16 => value as u16 as f32,
            SampleType::U32 => value as u32 as f32,
            SampleType::F32 => value,
        }
    }
}

/// Image width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

impl ImageDimensions {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded grayscale slice.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    dimensions: ImageDimensions,
    sample_type: SampleType,
    pixels: Vec<f32>,
}

impl GrayImage {
    pub fn new(
        dimensions: ImageDimensions,
        sample_type: SampleType,
        pixels: Vec<f32>,
    ) -> Result<Self> {
        if pixels.len() != dimensions.pixel_count() {
            return Err(Error::BufferSize {
                expected: dimensions.pixel_count(),
                actual: pixels.len(),
            });
        }

        Ok(Self {
            dimensions,
            sample_type,
            pixels,
        })
    }

    pub fn zeros(dimensions: ImageDimensions, sample_type: SampleType) -> Self {
        Self {
            dimensions,
            sample_type,
            pixels: vec![0.0; dimensions.pixel_count()],
        }
    }

    pub fn dimensions(&self) -> ImageDimensions {
        self.dimensions
    }

    pub fn width(&self) -> usize {
        self.dimensions.width
    }

    pub fn height(&self) -> usize {
        self.dimensions.height
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    /// Samples converted to the storage type `T`, using [`SampleType::quantize`] semantics.
    pub(crate) fn samples<T: FromWorking>(&self) -> Vec<T> {
        self.pixels.iter().map(|&v| T::from_working(v)).collect()
    }
}

/// Conversion from the `f32` working representation into a storage sample.
pub(crate) trait FromWorking: Copy {
    fn from_working(value: f32) -> Self;
}

impl FromWorking for u8 {
    fn from_working(value: f32) -> Self {
        value as u8
    }
}

impl FromWorking for u16 {
    fn from_working(value: f32) -> Self {
        value as u16
    }
}

impl FromWorking for u32 {
    fn from_working(value: f32) -> Self {
        value as u32
    }
}

impl FromWorking for f32 {
    fn from_working(value: f32) -> Self {
        value
    }
}

/// Collapses interleaved RGB samples to one luma value per pixel.
///
/// Integer sample types are rounded to the nearest count.
pub(crate) fn rgb_to_gray(rgb: &[f32], sample_type: SampleType) -> Vec<f32> {
    debug_assert!(rgb.len().is_multiple_of(3));

    rgb.chunks_exact(3)
        .map(|px| {
            let y = px[0] * LUMA_WEIGHTS[0] + px[1] * LUMA_WEIGHTS[1] + px[2] * LUMA_WEIGHTS[2];
            if sample_type.is_integer() {
                y.round()
            } else {
                y
            }
        })
        .collect()
}

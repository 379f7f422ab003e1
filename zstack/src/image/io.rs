use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};

use super::{rgb_to_gray, Error, GrayImage, ImageDimensions, Result, SampleType};

fn check_channels(channels: usize) -> Result<()> {
    match channels {
        1 | 3 => Ok(()),
        _ => Err(Error::UnsupportedChannelCount { channels }),
    }
}

fn to_gray(samples: Vec<f32>, channels: usize, sample_type: SampleType) -> Vec<f32> {
    if channels == 3 {
        rgb_to_gray(&samples, sample_type)
    } else {
        samples
    }
}

pub(crate) fn load_tiff(path: &Path) -> Result<GrayImage> {
    // Stacks from microscopes routinely exceed the default decoder limits.
    let mut decoder =
        Decoder::new(BufReader::new(File::open(path)?))?.with_limits(Limits::unlimited());

    let channels = match decoder.colortype()? {
        tiff::ColorType::Gray(_) => 1,
        tiff::ColorType::GrayA(_) => 2,
        tiff::ColorType::RGB(_) => 3,
        tiff::ColorType::RGBA(_) | tiff::ColorType::CMYK(_) => 4,
        other => {
            return Err(Error::UnsupportedSampleFormat(format!(
                "TIFF color type {:?}",
                other
            )));
        }
    };
    check_channels(channels)?;

    let (width, height) = decoder.dimensions()?;

    let (sample_type, samples): (SampleType, Vec<f32>) = match decoder.read_image()? {
        DecodingResult::U8(buf) => (SampleType::U8, buf.into_iter().map(f32::from).collect()),
        DecodingResult::U16(buf) => (SampleType::U16, buf.into_iter().map(f32::from).collect()),
        DecodingResult::U32(buf) => (SampleType::U32, buf.into_iter().map(|v| v as f32).collect()),
        DecodingResult::F32(buf) => (SampleType::F32, buf),
        _ => {
            return Err(Error::UnsupportedSampleFormat(
                "TIFF samples must be u8, u16, u32 or f32".to_string(),
            ));
        }
    };

    let pixels = to_gray(samples, channels, sample_type);
    GrayImage::new(
        ImageDimensions::new(width as usize, height as usize),
        sample_type,
        pixels,
    )
}

pub(crate) fn load_png_jpeg(path: &Path) -> Result<GrayImage> {
    let img = image_lib::open(path)?;
    let dimensions = ImageDimensions::new(img.width() as usize, img.height() as usize);

    let (channels, sample_type, samples): (usize, SampleType, Vec<f32>) = match img.color() {
        image_lib::ColorType::L8 => (
            1,
            SampleType::U8,
            img.into_luma8().into_raw().into_iter().map(f32::from).collect(),
        ),
        image_lib::ColorType::L16 => (
            1,
            SampleType::U16,
            img.into_luma16().into_raw().into_iter().map(f32::from).collect(),
        ),
        image_lib::ColorType::Rgb8 => (
            3,
            SampleType::U8,
            img.into_rgb8().into_raw().into_iter().map(f32::from).collect(),
        ),
        image_lib::ColorType::Rgb16 => (
            3,
            SampleType::U16,
            img.into_rgb16().into_raw().into_iter().map(f32::from).collect(),
        ),
        image_lib::ColorType::Rgb32F => (3, SampleType::F32, img.into_rgb32f().into_raw()),
        image_lib::ColorType::La8 | image_lib::ColorType::La16 => {
            return Err(Error::UnsupportedChannelCount { channels: 2 });
        }
        image_lib::ColorType::Rgba8
        | image_lib::ColorType::Rgba16
        | image_lib::ColorType::Rgba32F => {
            return Err(Error::UnsupportedChannelCount { channels: 4 });
        }
        other => {
            return Err(Error::UnsupportedSampleFormat(format!("{:?}", other)));
        }
    };

    let pixels = to_gray(samples, channels, sample_type);
    GrayImage::new(dimensions, sample_type, pixels)
}

pub(crate) fn save_tiff(image: &GrayImage, path: &Path) -> Result<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let (width, height) = (image.width() as u32, image.height() as u32);

    match image.sample_type() {
        SampleType::U8 => {
            encoder.write_image::<colortype::Gray8>(width, height, &image.samples::<u8>())?
        }
        SampleType::U16 => {
            encoder.write_image::<colortype::Gray16>(width, height, &image.samples::<u16>())?
        }
        SampleType::U32 => {
            encoder.write_image::<colortype::Gray32>(width, height, &image.samples::<u32>())?
        }
        SampleType::F32 => {
            encoder.write_image::<colortype::Gray32Float>(width, height, image.pixels())?
        }
    }

    Ok(())
}

pub(crate) fn save_png(image: &GrayImage, path: &Path) -> Result<()> {
    let (width, height) = (image.width() as u32, image.height() as u32);

    match image.sample_type() {
        SampleType::U8 => image_lib::save_buffer_with_format(
            path,
            &image.samples::<u8>(),
            width,
            height,
            image_lib::ColorType::L8,
            image_lib::ImageFormat::Png,
        )?,
        SampleType::U16 => {
            let samples = image.samples::<u16>();
            image_lib::save_buffer_with_format(
                path,
                bytemuck::cast_slice(&samples),
                width,
                height,
                image_lib::ColorType::L16,
                image_lib::ImageFormat::Png,
            )?
        }
        other => {
            return Err(Error::UnsupportedSampleFormat(format!(
                "PNG cannot store {} samples",
                other
            )));
        }
    }

    Ok(())
}

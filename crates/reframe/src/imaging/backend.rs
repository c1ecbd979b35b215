//! Pixel operations on the `image` crate.
//!
//! | Operation | Function |
//! |---|---|
//! | Decode | `image::load_from_memory` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resample | `DynamicImage::resize_exact` with the strategy's kernel |
//! | Denoise | `DynamicImage::blur` |
//! | Sharpen | `DynamicImage::unsharpen` |
//! | Encode | `JpegEncoder` |
//!
//! These are CPU bound; async callers run them under `spawn_blocking`.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};

use super::params::{Quality, UpscaleStrategy};
use crate::error::ConvertError;
use crate::models::CropArea;

/// Extensions accepted as conversion input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Reads width and height from the header without decoding pixels.
pub fn read_dimensions(bytes: &[u8], path: &Path) -> Result<(u32, u32), ConvertError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))?
        .into_dimensions()
        .map_err(|e| decode_error(path, e))
}

pub fn decode(bytes: &[u8], path: &Path) -> Result<DynamicImage, ConvertError> {
    image::load_from_memory(bytes).map_err(|e| decode_error(path, e))
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> ConvertError {
    ConvertError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

pub fn crop(img: &DynamicImage, area: &CropArea) -> DynamicImage {
    img.crop_imm(area.x, area.y, area.width, area.height)
}

/// Resizes to exactly `width × height` using the recipe for `strategy`.
pub fn resample(
    img: &DynamicImage,
    width: u32,
    height: u32,
    strategy: UpscaleStrategy,
) -> DynamicImage {
    let mut out = if (img.width(), img.height()) == (width, height) {
        img.clone()
    } else {
        img.resize_exact(width, height, strategy.kernel().filter())
    };

    if let Some(sigma) = strategy.denoise_sigma() {
        out = out.blur(sigma);
    }

    if let Some(sharpening) = strategy.sharpening() {
        out = out.unsharpen(sharpening.sigma, sharpening.threshold);
    }

    out
}

pub fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, ConvertError> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.value())
        .encode_image(&rgb)
        .map_err(|e| ConvertError::Encode(e.to_string()))?;
    Ok(buffer)
}

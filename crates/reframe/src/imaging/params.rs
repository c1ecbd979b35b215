//! Resampling and crop parameters.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Detections below these confidences do not influence crop placement.
pub const FACE_CONFIDENCE_THRESHOLD: f64 = 0.4;
pub const PERSON_CONFIDENCE_THRESHOLD: f64 = 0.35;

/// Scale factor above which the aggressive upscaling path is used.
pub const MODERATE_UPSCALE_LIMIT: f64 = 1.5;

/// How a crop window is positioned once its size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategy {
    Center,
    /// Weighted centroid of faces, or persons when no face was found.
    #[default]
    CenterFaces,
    /// Keep the union of every detection inside the crop when it fits.
    PreserveAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleKernel {
    Lanczos3,
    CatmullRom,
}

impl ResampleKernel {
    pub fn filter(&self) -> FilterType {
        match self {
            ResampleKernel::Lanczos3 => FilterType::Lanczos3,
            ResampleKernel::CatmullRom => FilterType::CatmullRom,
        }
    }
}

/// Unsharp-mask settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    /// Blur radius of the mask.
    pub sigma: f32,
    /// Minimum brightness change to sharpen.
    pub threshold: i32,
}

impl Sharpening {
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }

    pub fn strong() -> Self {
        Self {
            sigma: 1.2,
            threshold: 1,
        }
    }
}

/// Resampling recipe chosen from the scale between crop and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpscaleStrategy {
    /// Downscale or same size.
    None,
    Moderate,
    Aggressive,
}

impl UpscaleStrategy {
    pub fn for_scale(scale: f64) -> Self {
        if scale <= 1.0 {
            UpscaleStrategy::None
        } else if scale <= MODERATE_UPSCALE_LIMIT {
            UpscaleStrategy::Moderate
        } else {
            UpscaleStrategy::Aggressive
        }
    }

    pub fn kernel(&self) -> ResampleKernel {
        match self {
            UpscaleStrategy::None | UpscaleStrategy::Moderate => ResampleKernel::Lanczos3,
            UpscaleStrategy::Aggressive => ResampleKernel::CatmullRom,
        }
    }

    /// Gaussian blur applied after resampling to smooth interpolation noise.
    pub fn denoise_sigma(&self) -> Option<f32> {
        match self {
            UpscaleStrategy::Aggressive => Some(0.4),
            _ => None,
        }
    }

    pub fn sharpening(&self) -> Option<Sharpening> {
        match self {
            UpscaleStrategy::None => None,
            UpscaleStrategy::Moderate => Some(Sharpening::light()),
            UpscaleStrategy::Aggressive => Some(Sharpening::strong()),
        }
    }
}

/// JPEG quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

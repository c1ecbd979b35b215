//! Aspect-ratio conversion: crop selection, resampling and encoding.

pub mod backend;
pub mod calculations;
pub mod engine;
pub mod params;

pub use engine::{ConversionEngine, CroppedImage};
pub use params::{CropStrategy, Quality, UpscaleStrategy};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// Target width:height relationship with a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
    pub name: String,
}

impl AspectRatio {
    /// Creates a ratio named `WxH`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            name: format!("{}x{}", width, height),
        }
    }

    pub fn named(width: u32, height: u32, name: impl Into<String>) -> Self {
        Self {
            width,
            height,
            name: name.into(),
        }
    }

    /// Width divided by height.
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::InvalidAspectRatio {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// File-name friendly form of the display name.
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { 'x' })
            .collect();
        if slug.is_empty() {
            format!("{}x{}", self.width, self.height)
        } else {
            slug
        }
    }
}

/// An uploaded image, created before the job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Describes a stored upload, guessing the MIME type from its extension.
    pub fn new(path: impl AsRef<Path>, original_name: impl Into<String>, size: u64) -> Self {
        let path = path.as_ref().to_path_buf();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_name: original_name.into(),
            size,
            mime_type,
            path,
            uploaded_at: Utc::now(),
        }
    }

    /// Original name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.original_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub confidence: f64,
}

/// Face and person boxes found in one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub faces: Vec<Detection>,
    pub persons: Vec<Detection>,
    /// Mean confidence over every detection, 0 when there are none.
    pub confidence: f64,
}

impl DetectionResult {
    pub fn new(faces: Vec<Detection>, persons: Vec<Detection>) -> Self {
        let count = faces.len() + persons.len();
        let confidence = if count == 0 {
            0.0
        } else {
            faces
                .iter()
                .chain(persons.iter())
                .map(|d| d.confidence)
                .sum::<f64>()
                / count as f64
        };

        Self {
            faces,
            persons,
            confidence,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.persons.is_empty()
    }
}

/// Source rectangle extracted before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f64,
}

impl CropArea {
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Which branch produced the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionBundle {
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// One successfully converted input. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub id: String,
    pub original_file_id: String,
    pub output_path: PathBuf,
    pub crop_area: CropArea,
    pub aspect_ratio: AspectRatio,
    pub detections: DetectionResult,
    pub processing_time_ms: u64,
    pub output_width: u32,
    pub output_height: u32,
    pub upscale_factor: f64,
    pub quality_score: f64,
    pub crop_source: CropSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<CaptionBundle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_slug() {
        assert_eq!(AspectRatio::new(4, 6).slug(), "4x6");
        assert_eq!(AspectRatio::named(16, 9, "16:9").slug(), "16x9");
        assert_eq!(AspectRatio::named(1, 1, "").slug(), "1x1");
    }

    #[test]
    fn test_aspect_ratio_validate() {
        assert!(AspectRatio::new(4, 6).validate().is_ok());
        assert!(AspectRatio::new(0, 6).validate().is_err());
    }

    #[test]
    fn test_file_metadata_guesses_mime() {
        let meta = FileMetadata::new("/uploads/beach.jpg", "beach.jpg", 1024);
        assert_eq!(meta.mime_type, "image/jpeg");
        assert_eq!(meta.stem(), "beach");
        assert!(!meta.id.is_empty());
    }

    #[test]
    fn test_detection_result_aggregate_confidence() {
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let result = DetectionResult::new(
            vec![Detection {
                bounding_box: bbox,
                confidence: 0.9,
            }],
            vec![Detection {
                bounding_box: bbox,
                confidence: 0.5,
            }],
        );
        assert!((result.confidence - 0.7).abs() < 1e-9);
        assert_eq!(DetectionResult::empty().confidence, 0.0);
        assert!(DetectionResult::empty().is_empty());
    }

    #[test]
    fn test_crop_area_fits_within() {
        let crop = CropArea {
            x: 10,
            y: 0,
            width: 90,
            height: 50,
            confidence: 0.5,
        };
        assert!(crop.fits_within(100, 50));
        assert!(!crop.fits_within(99, 50));
    }
}

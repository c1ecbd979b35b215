//! JSON bodies exchanged with the processing service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::imaging::params::CropStrategy;
use crate::models::{BoundingBox, Detection, DetectionResult, GridLayout, Orientation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    Face,
    Person,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDimensions {
    pub rows: u32,
    pub columns: u32,
}

impl From<&GridLayout> for GridDimensions {
    fn from(layout: &GridLayout) -> Self {
        Self {
            rows: layout.rows,
            columns: layout.columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetection {
    #[serde(rename = "type")]
    pub kind: DetectionType,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub image_path: String,
    pub detection_types: Vec<DetectionType>,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub image_path: String,
    pub detections: Vec<WireDetection>,
    pub processing_time: f64,
    #[serde(default)]
    pub image_dimensions: HashMap<String, u32>,
}

impl DetectionResponse {
    /// Splits wire detections into faces and persons.
    pub fn into_result(self) -> DetectionResult {
        let mut faces = Vec::new();
        let mut persons = Vec::new();
        for d in self.detections {
            let detection = Detection {
                bounding_box: d.bounding_box,
                confidence: d.confidence,
            };
            match d.kind {
                DetectionType::Face => faces.push(detection),
                DetectionType::Person => persons.push(detection),
            }
        }
        DetectionResult::new(faces, persons)
    }
}

/// Flattens a detection result back into wire form.
pub fn detections_to_wire(result: &DetectionResult) -> Vec<WireDetection> {
    let tag = |kind: DetectionType| {
        move |d: &Detection| WireDetection {
            kind,
            confidence: d.confidence,
            bounding_box: d.bounding_box,
        }
    };
    result
        .faces
        .iter()
        .map(tag(DetectionType::Face))
        .chain(result.persons.iter().map(tag(DetectionType::Person)))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropRequest {
    pub image_path: String,
    pub target_aspect_ratio: RatioDimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_results: Option<Vec<WireDetection>>,
    pub crop_strategy: CropStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// Result of a remote crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProcessedImage {
    pub original_path: String,
    pub processed_path: String,
    pub crop_coordinates: BoundingBox,
    pub final_dimensions: RatioDimensions,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProcessRequest {
    pub images: Vec<String>,
    pub target_aspect_ratio: RatioDimensions,
    pub crop_strategy: CropStrategy,
    pub detection_types: Vec<DetectionType>,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedImage {
    pub path: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProcessResult {
    pub processed_images: Vec<RemoteProcessedImage>,
    pub failed_images: Vec<FailedImage>,
    pub total_processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Image,
    Pdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetCompositionRequest {
    pub processed_images: Vec<String>,
    pub grid_layout: GridDimensions,
    pub sheet_orientation: Orientation,
    pub output_format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteComposedSheet {
    pub output_path: String,
    pub grid_layout: GridDimensions,
    pub images_used: Vec<String>,
    #[serde(default)]
    pub sheet_dimensions: HashMap<String, u32>,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthState,
    #[serde(default)]
    pub checks: HashMap<String, bool>,
    #[serde(default)]
    pub uptime_seconds: Option<f64>,
}

impl HealthResponse {
    /// Degraded still serves requests.
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy | HealthState::Degraded)
    }
}

/// Structured error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

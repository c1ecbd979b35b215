//! Synthetic inputs and remote-service doubles.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use reframe::models::{
    AspectRatio, BoundingBox, GridLayout, Orientation, ProcessingOptions, SheetCompositionOptions,
};
use reframe::remote::wire::{DetectionType, GridDimensions, RatioDimensions, WireDetection};
use reframe::remote::{
    BatchProcessRequest, BatchProcessResult, CropRequest, DetectionRequest, DetectionResponse,
    HealthResponse, ProcessingService, RemoteComposedSheet, RemoteError, RemoteProcessedImage,
    SheetCompositionRequest,
};

/// Encodes a gradient JPEG so crops and resizes have real pixels to move.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&img)
        .expect("encode test jpeg");
    bytes
}

/// Builder for `ProcessingOptions`.
pub struct OptionsBuilder {
    options: ProcessingOptions,
}

impl OptionsBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            options: ProcessingOptions::new(AspectRatio::new(width, height)),
        }
    }

    pub fn detection(mut self) -> Self {
        self.options.detection_enabled = true;
        self
    }

    pub fn sheets(mut self, rows: u32, columns: u32) -> Self {
        self.options.sheet_composition = Some(SheetCompositionOptions {
            grid_layout: GridLayout::new(rows, columns).expect("valid grid"),
            orientation: Orientation::Portrait,
            generate_document: false,
        });
        self
    }

    pub fn document(mut self) -> Self {
        if let Some(sheet) = self.options.sheet_composition.as_mut() {
            sheet.generate_document = true;
        }
        self
    }

    pub fn build(self) -> ProcessingOptions {
        self.options
    }
}

fn refused() -> RemoteError {
    RemoteError::Connection {
        message: "connection refused".to_string(),
    }
}

/// A processing service that is never reachable.
#[derive(Default)]
pub struct OfflineService {
    pub calls: AtomicU32,
}

#[async_trait]
impl ProcessingService for OfflineService {
    async fn detect_objects(
        &self,
        _request: &DetectionRequest,
    ) -> Result<DetectionResponse, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn crop_image(&self, _request: &CropRequest) -> Result<RemoteProcessedImage, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn process_batch(
        &self,
        _request: &BatchProcessRequest,
    ) -> Result<BatchProcessResult, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn compose_sheet(
        &self,
        _request: &SheetCompositionRequest,
    ) -> Result<RemoteComposedSheet, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }

    async fn check_health(&self) -> Result<HealthResponse, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(refused())
    }
}

/// Offline except that cropping any path containing `stall_marker` hangs for
/// `stall`, long enough to trip the per-image timeout.
pub struct StallingService {
    pub stall_marker: &'static str,
    pub stall: Duration,
}

#[async_trait]
impl ProcessingService for StallingService {
    async fn detect_objects(
        &self,
        _request: &DetectionRequest,
    ) -> Result<DetectionResponse, RemoteError> {
        Err(refused())
    }

    async fn crop_image(&self, request: &CropRequest) -> Result<RemoteProcessedImage, RemoteError> {
        if request.image_path.contains(self.stall_marker) {
            tokio::time::sleep(self.stall).await;
        }
        Err(refused())
    }

    async fn process_batch(
        &self,
        _request: &BatchProcessRequest,
    ) -> Result<BatchProcessResult, RemoteError> {
        Err(refused())
    }

    async fn compose_sheet(
        &self,
        _request: &SheetCompositionRequest,
    ) -> Result<RemoteComposedSheet, RemoteError> {
        Err(refused())
    }

    async fn check_health(&self) -> Result<HealthResponse, RemoteError> {
        Err(refused())
    }
}

/// A working service double: detects one fixed face and crops centrally by
/// writing real files, the way the remote service does.
pub struct FakeRemote {
    pub face: Option<BoundingBox>,
    pub crop_requests: Mutex<Vec<CropRequest>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            face: None,
            crop_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_face(face: BoundingBox) -> Self {
        Self {
            face: Some(face),
            ..Self::new()
        }
    }
}

fn service_error(message: impl ToString) -> RemoteError {
    RemoteError::Service {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ProcessingService for FakeRemote {
    async fn detect_objects(
        &self,
        request: &DetectionRequest,
    ) -> Result<DetectionResponse, RemoteError> {
        Ok(DetectionResponse {
            image_path: request.image_path.clone(),
            detections: self
                .face
                .map(|bounding_box| WireDetection {
                    kind: DetectionType::Face,
                    confidence: 0.92,
                    bounding_box,
                })
                .into_iter()
                .collect(),
            processing_time: 0.02,
            image_dimensions: Default::default(),
        })
    }

    async fn crop_image(&self, request: &CropRequest) -> Result<RemoteProcessedImage, RemoteError> {
        self.crop_requests
            .lock()
            .expect("crop log")
            .push(request.clone());

        let img = image::open(&request.image_path).map_err(service_error)?;
        let ratio = request.target_aspect_ratio.width as f64
            / request.target_aspect_ratio.height as f64;
        let area = reframe::imaging::calculations::center_crop((img.width(), img.height()), ratio);
        let cropped = img.crop_imm(area.x, area.y, area.width, area.height);

        let output = request
            .output_path
            .clone()
            .ok_or_else(|| service_error("output_path required"))?;
        if let Some(parent) = Path::new(&output).parent() {
            std::fs::create_dir_all(parent).map_err(service_error)?;
        }
        cropped.save(&output).map_err(service_error)?;

        Ok(RemoteProcessedImage {
            original_path: request.image_path.clone(),
            processed_path: output,
            crop_coordinates: BoundingBox {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height,
            },
            final_dimensions: RatioDimensions {
                width: area.width,
                height: area.height,
            },
            processing_time: 0.05,
        })
    }

    async fn process_batch(
        &self,
        _request: &BatchProcessRequest,
    ) -> Result<BatchProcessResult, RemoteError> {
        Err(service_error("batch processing not offered"))
    }

    async fn compose_sheet(
        &self,
        request: &SheetCompositionRequest,
    ) -> Result<RemoteComposedSheet, RemoteError> {
        // Composition is left to the local renderer.
        Err(RemoteError::Service {
            status: 503,
            message: format!(
                "composition unavailable for {}x{}",
                request.grid_layout.rows, request.grid_layout.columns
            ),
        })
    }

    async fn check_health(&self) -> Result<HealthResponse, RemoteError> {
        serde_json::from_str(r#"{"status": "healthy"}"#).map_err(service_error)
    }
}

pub fn grid(rows: u32, columns: u32) -> GridDimensions {
    GridDimensions { rows, columns }
}

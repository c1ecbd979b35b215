//! Client side of the remote pixel-processing service.

use async_trait::async_trait;

pub mod client;
pub mod error;
pub mod health;
pub mod wire;

pub use client::{RemoteClient, RetryPolicy};
pub use error::RemoteError;
pub use health::HealthMonitor;
pub use wire::{
    BatchProcessRequest, BatchProcessResult, CropRequest, DetectionRequest, DetectionResponse,
    HealthResponse, RemoteComposedSheet, RemoteProcessedImage, SheetCompositionRequest,
};

/// Operations offered by the processing service. [`RemoteClient`] talks HTTP;
/// tests substitute their own implementations.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    async fn detect_objects(
        &self,
        request: &DetectionRequest,
    ) -> Result<DetectionResponse, RemoteError>;

    async fn crop_image(&self, request: &CropRequest) -> Result<RemoteProcessedImage, RemoteError>;

    async fn process_batch(
        &self,
        request: &BatchProcessRequest,
    ) -> Result<BatchProcessResult, RemoteError>;

    async fn compose_sheet(
        &self,
        request: &SheetCompositionRequest,
    ) -> Result<RemoteComposedSheet, RemoteError>;

    async fn check_health(&self) -> Result<HealthResponse, RemoteError>;
}

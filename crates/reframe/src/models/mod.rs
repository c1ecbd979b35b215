//! Domain records shared by the engine, composer and orchestrator.

pub mod image;
pub mod job;
pub mod sheet;

pub use image::{
    AspectRatio, BoundingBox, CaptionBundle, CropArea, CropSource, Detection, DetectionResult,
    FileMetadata, ProcessedImage,
};
pub use job::{
    ImageFailure, Job, JobProgress, JobStage, JobStatus, ProcessingOptions, ProgressWeights,
    StageProgress,
};
pub use sheet::{ComposedSheet, GridLayout, Orientation, SheetCompositionOptions};

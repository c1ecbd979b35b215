use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::{AspectRatio, FileMetadata, ProcessedImage};
use super::sheet::{ComposedSheet, SheetCompositionOptions};
use crate::error::JobError;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Composing,
    GeneratingDocument,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Composing => "composing",
            JobStatus::GeneratingDocument => "generating_document",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase reported in progress snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Uploading,
    Processing,
    Composing,
    GeneratingDocument,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Uploading => write!(f, "Uploading"),
            JobStage::Processing => write!(f, "Processing images"),
            JobStage::Composing => write!(f, "Composing sheets"),
            JobStage::GeneratingDocument => write!(f, "Generating document"),
            JobStage::Completed => write!(f, "Completed"),
            JobStage::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub detection_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_composition: Option<SheetCompositionOptions>,
    #[serde(default)]
    pub generate_descriptive_names: bool,
    #[serde(default)]
    pub generate_captions: bool,
}

impl ProcessingOptions {
    /// Plain conversion to `aspect_ratio` with every optional step off.
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            detection_enabled: false,
            sheet_composition: None,
            generate_descriptive_names: false,
            generate_captions: false,
        }
    }

    pub fn validate(&self) -> Result<(), JobError> {
        self.aspect_ratio
            .validate()
            .map_err(|e| JobError::InvalidOptions(e.to_string()))?;
        if let Some(sheet) = &self.sheet_composition {
            sheet
                .grid_layout
                .validate()
                .map_err(|e| JobError::InvalidOptions(e.to_string()))?;
        }
        Ok(())
    }

    pub fn generates_document(&self) -> bool {
        self.sheet_composition
            .as_ref()
            .is_some_and(|s| s.generate_document)
    }
}

/// Per-stage percentages, each 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub processing: f64,
    pub composing: f64,
    pub document_generation: f64,
}

/// Share of the overall percentage each stage accounts for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressWeights {
    pub processing: f64,
    pub composing: f64,
    pub document_generation: f64,
}

impl ProgressWeights {
    pub fn for_options(options: &ProcessingOptions) -> Self {
        match &options.sheet_composition {
            None => Self {
                processing: 100.0,
                composing: 0.0,
                document_generation: 0.0,
            },
            Some(sheet) if sheet.generate_document => Self {
                processing: 80.0,
                composing: 10.0,
                document_generation: 10.0,
            },
            Some(_) => Self {
                processing: 90.0,
                composing: 10.0,
                document_generation: 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub current_stage: JobStage,
    pub processed_images: usize,
    pub total_images: usize,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_progress: Option<StageProgress>,
}

impl JobProgress {
    pub fn new(total_images: usize) -> Self {
        Self {
            current_stage: JobStage::Uploading,
            processed_images: 0,
            total_images,
            percentage: 0.0,
            stage_progress: Some(StageProgress::default()),
        }
    }

    /// Counts one finished image, successful or not.
    pub fn record_image(&mut self, weights: &ProgressWeights) {
        self.processed_images = (self.processed_images + 1).min(self.total_images);
        let fraction = if self.total_images == 0 {
            1.0
        } else {
            self.processed_images as f64 / self.total_images as f64
        };
        self.stages_mut().processing = round1(fraction * 100.0);
        self.recompute(weights);
    }

    /// Moves to `stage`, resetting that stage's own percentage.
    pub fn enter_stage(&mut self, stage: JobStage, weights: &ProgressWeights) {
        self.current_stage = stage;
        let stages = self.stages_mut();
        match stage {
            JobStage::Processing => stages.processing = 0.0,
            JobStage::Composing => stages.composing = 0.0,
            JobStage::GeneratingDocument => stages.document_generation = 0.0,
            _ => {}
        }
        self.recompute(weights);
    }

    pub fn finish_stage(&mut self, stage: JobStage, weights: &ProgressWeights) {
        let stages = self.stages_mut();
        match stage {
            JobStage::Processing => stages.processing = 100.0,
            JobStage::Composing => stages.composing = 100.0,
            JobStage::GeneratingDocument => stages.document_generation = 100.0,
            _ => {}
        }
        self.recompute(weights);
    }

    pub fn complete(&mut self) {
        self.current_stage = JobStage::Completed;
        self.percentage = 100.0;
    }

    pub fn fail(&mut self) {
        self.current_stage = JobStage::Failed;
    }

    fn stages_mut(&mut self) -> &mut StageProgress {
        self.stage_progress.get_or_insert_with(StageProgress::default)
    }

    fn recompute(&mut self, weights: &ProgressWeights) {
        let stages = self.stage_progress.unwrap_or_default();
        let overall = (stages.processing * weights.processing
            + stages.composing * weights.composing
            + stages.document_generation * weights.document_generation)
            / 100.0;
        // Never report less than before.
        self.percentage = self.percentage.max(round1(overall.min(100.0)));
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// An input that failed conversion without failing the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    pub file_id: String,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub files: Vec<FileMetadata>,
    pub options: ProcessingOptions,
    pub progress: JobProgress,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub failures: Vec<ImageFailure>,
    #[serde(default)]
    pub processed_images: Vec<ProcessedImage>,
    #[serde(default)]
    pub composed_sheets: Vec<ComposedSheet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
}

impl Job {
    pub fn new(files: Vec<FileMetadata>, options: ProcessingOptions, user_id: &str) -> Self {
        let total = files.len();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            files,
            options,
            progress: JobProgress::new(total),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
            failures: Vec::new(),
            processed_images: Vec::new(),
            composed_sheets: Vec::new(),
            document_path: None,
        }
    }
}

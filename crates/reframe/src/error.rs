use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum ReframeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Composition error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid environment override {name}='{value}'")]
    InvalidEnv { name: String, value: String },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image '{path}' is {size} bytes, limit is {limit}")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid aspect ratio {width}:{height}")]
    InvalidAspectRatio { width: u32, height: u32 },

    #[error("Failed to decode image '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Image processing failed: {0}")]
    Processing(String),

    #[error("Remote processing failed: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("No processed images to compose")]
    NoImages,

    #[error("No sheets to place in the document")]
    NoSheets,

    #[error("Invalid grid layout {rows}x{columns}: rows and columns must be within 1..=10")]
    InvalidGrid { rows: u32, columns: u32 },

    #[error("Failed to render sheet: {0}")]
    Render(String),

    #[error("Failed to build PDF: {0}")]
    Pdf(String),

    #[error("Remote composition failed: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job has no input files")]
    NoInputFiles,

    #[error("Job has {count} files, the limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("All {total} images failed to process")]
    NoSuccessfulImages { total: usize },

    #[error("Image '{file}' timed out after {millis} ms")]
    ImageTimeout { file: String, millis: u64 },

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, ReframeError>;

pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod remote;
pub mod storage;

pub use compose::SheetComposer;
pub use config::{load_config, load_config_from_str, ServiceConfig};
pub use db::{Database, DatabaseError, MemoryRecordStore, RecordStore, SqliteRecordStore};
pub use error::{
    ComposeError, ConfigError, ConvertError, JobError, ReframeError, Result, StorageError,
};
pub use imaging::ConversionEngine;
pub use models::{
    AspectRatio, ComposedSheet, FileMetadata, GridLayout, Job, JobProgress, JobStatus,
    Orientation, ProcessedImage, ProcessingOptions, SheetCompositionOptions,
};
pub use orchestrator::{JobEvent, Orchestrator, QueueStatus};
pub use remote::{HealthMonitor, ProcessingService, RemoteClient, RemoteError};
pub use storage::{FileStorage, Storage};

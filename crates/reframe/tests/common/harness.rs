//! Orchestrator wired into a scratch directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use reframe::config::{ComposeConfig, ConversionConfig, QueueConfig};
use reframe::{
    ConversionEngine, FileMetadata, FileStorage, Job, JobEvent, MemoryRecordStore, Orchestrator,
    ProcessingService, RecordStore, SheetComposer, Storage,
};

use super::builders::jpeg_bytes;

pub struct TestHarness {
    pub temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sheets_dir: PathBuf,
    pub records: Arc<MemoryRecordStore>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn new(service: Arc<dyn ProcessingService>) -> Self {
        Self::with_queue(service, QueueConfig::default())
    }

    pub fn with_queue(service: Arc<dyn ProcessingService>, queue: QueueConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("processed");
        let sheets_dir = temp_dir.path().join("sheets");
        std::fs::create_dir_all(&input_dir).expect("create input dir");

        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new());
        let conversion = ConversionConfig {
            output_dir: output_dir.clone(),
            min_output_size: 300,
            ..ConversionConfig::default()
        };
        let engine = Arc::new(ConversionEngine::new(
            conversion,
            Arc::clone(&service),
            Arc::clone(&storage),
        ));
        let composer = Arc::new(SheetComposer::new(
            &ComposeConfig {
                output_dir: sheets_dir.clone(),
            },
            service,
            Arc::clone(&storage),
        ));

        let records = Arc::new(MemoryRecordStore::new());
        let record_store: Arc<dyn RecordStore> = records.clone();
        let orchestrator = Orchestrator::new(queue, engine, composer, record_store, storage);

        Self {
            temp_dir,
            input_dir,
            output_dir,
            sheets_dir,
            records,
            orchestrator,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a gradient JPEG into the input directory and describes it.
    pub fn write_jpeg(&self, name: &str, width: u32, height: u32) -> FileMetadata {
        self.write_input(name, &jpeg_bytes(width, height))
    }

    pub fn write_input(&self, name: &str, bytes: &[u8]) -> FileMetadata {
        let path = self.input_dir.join(name);
        std::fs::write(&path, bytes).expect("write input file");
        FileMetadata::new(&path, name, bytes.len() as u64)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.orchestrator.subscribe()
    }

    /// Polls until the job reaches a terminal status.
    pub async fn wait_for(&self, job_id: &str) -> Job {
        for _ in 0..1200 {
            if let Some(job) = self.orchestrator.get_job_status(job_id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {job_id} did not finish in time");
    }
}

/// Collects events for `job_id` until its terminal event arrives.
pub async fn collect_events(rx: &mut broadcast::Receiver<JobEvent>, job_id: &str) -> Vec<JobEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("event before timeout")
            .expect("channel open");
        if event.job_id() != Some(job_id) {
            continue;
        }
        let terminal = matches!(
            event,
            JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. }
        );
        events.push(event);
        if terminal {
            return events;
        }
    }
}

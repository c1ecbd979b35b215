//! Job orchestration: admission, per-image fan-out, composition and
//! notifications.
//!
//! The orchestrator owns every [`Job`] it creates. Each job runs on its own
//! tokio task once the queue admits it, and every state change is mirrored to
//! the [`RecordStore`] and announced as a [`JobEvent`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::compose::SheetComposer;
use crate::config::schema::MAX_BATCH_SIZE;
use crate::config::QueueConfig;
use crate::db::RecordStore;
use crate::error::JobError;
use crate::imaging::ConversionEngine;
use crate::models::{FileMetadata, Job, ProcessingOptions};
use crate::storage::Storage;

pub mod events;
pub mod queue;
mod runner;
pub mod store;

pub use events::{EventBroadcaster, JobEvent};
pub use queue::{JobQueue, QueueStatus};
pub use store::JobTable;

/// State shared between the public handle and running job tasks.
pub(crate) struct Shared {
    config: QueueConfig,
    engine: Arc<ConversionEngine>,
    composer: Arc<SheetComposer>,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn Storage>,
    jobs: JobTable,
    queue: JobQueue,
    events: EventBroadcaster,
}

#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(
        config: QueueConfig,
        engine: Arc<ConversionEngine>,
        composer: Arc<SheetComposer>,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let queue = JobQueue::new(config.max_concurrent_jobs);
        Self {
            shared: Arc::new(Shared {
                config,
                engine,
                composer,
                records,
                storage,
                jobs: JobTable::new(),
                queue,
                events: EventBroadcaster::default(),
            }),
        }
    }

    /// Registers a job and schedules it. The returned snapshot is `pending`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn create_job(
        &self,
        files: Vec<FileMetadata>,
        options: ProcessingOptions,
        user_id: &str,
    ) -> Result<Job, JobError> {
        options.validate()?;
        if files.len() > MAX_BATCH_SIZE {
            return Err(JobError::TooManyFiles {
                count: files.len(),
                limit: MAX_BATCH_SIZE,
            });
        }

        let job = Job::new(files, options, user_id);
        let shared = &self.shared;
        shared.jobs.insert(job.clone());
        if let Err(e) = shared.records.create_job(&job) {
            warn!(job_id = %job.id, error = %e, "Failed to persist new job record");
        }

        shared.queue.enqueue();
        shared.publish_queue();
        info!(job_id = %job.id, files = job.files.len(), "Job queued");

        tokio::spawn(Arc::clone(shared).run(job.id.clone()));
        Ok(job)
    }

    /// Live snapshot of a job, falling back to the record store for jobs this
    /// process no longer holds.
    pub fn get_job_status(&self, job_id: &str) -> Option<Job> {
        if let Some(job) = self.shared.jobs.get(job_id) {
            return Some(job);
        }
        match self.shared.records.get_job(job_id) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id, error = %e, "Failed to load job record");
                None
            }
        }
    }

    pub fn get_queue_status(&self) -> QueueStatus {
        self.shared.queue.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Deletes finished jobs created more than `older_than_hours` ago together
    /// with their output files. Jobs still running are left alone.
    pub async fn cleanup_old_jobs(&self, older_than_hours: u64) -> Result<usize, JobError> {
        let hours = i64::try_from(older_than_hours).unwrap_or(i64::MAX);
        let cutoff = Duration::try_hours(hours)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let shared = &self.shared;

        let mut candidates: Vec<Job> = shared
            .jobs
            .created_before(cutoff)
            .into_iter()
            .filter_map(|id| shared.jobs.get(&id))
            .collect();
        for job in shared.records.jobs_created_before(cutoff)? {
            if !candidates.iter().any(|c| c.id == job.id) {
                candidates.push(job);
            }
        }

        let mut removed = 0;
        for job in candidates {
            if !job.status.is_terminal() {
                debug!(job_id = %job.id, status = %job.status, "Skipping active job");
                continue;
            }

            for path in derived_files(&job) {
                if let Err(e) = shared.storage.delete(&path).await {
                    warn!(job_id = %job.id, path = %path.display(), error = %e, "Failed to delete job output");
                }
            }
            shared.records.delete_job(&job.id)?;
            shared.jobs.remove(&job.id);
            removed += 1;
        }

        if removed > 0 {
            info!(removed, older_than_hours, "Old jobs cleaned up");
        }
        Ok(removed)
    }
}

fn derived_files(job: &Job) -> Vec<std::path::PathBuf> {
    job.processed_images
        .iter()
        .map(|image| image.output_path.clone())
        .chain(job.composed_sheets.iter().map(|sheet| sheet.output_path.clone()))
        .chain(job.document_path.iter().map(std::path::PathBuf::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComposeConfig, ConversionConfig};
    use crate::db::MemoryRecordStore;
    use crate::models::{AspectRatio, JobStatus};
    use crate::remote::{
        BatchProcessRequest, BatchProcessResult, CropRequest, DetectionRequest,
        DetectionResponse, HealthResponse, ProcessingService, RemoteComposedSheet, RemoteError,
        RemoteProcessedImage, SheetCompositionRequest,
    };
    use crate::storage::FileStorage;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Unreachable;

    fn refused() -> RemoteError {
        RemoteError::Connection {
            message: "connection refused".into(),
        }
    }

    #[async_trait]
    impl ProcessingService for Unreachable {
        async fn detect_objects(
            &self,
            _request: &DetectionRequest,
        ) -> Result<DetectionResponse, RemoteError> {
            Err(refused())
        }

        async fn crop_image(
            &self,
            _request: &CropRequest,
        ) -> Result<RemoteProcessedImage, RemoteError> {
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

    fn orchestrator(dir: &TempDir) -> (Orchestrator, Arc<MemoryRecordStore>) {
        let service: Arc<dyn ProcessingService> = Arc::new(Unreachable);
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new());
        let conversion = ConversionConfig {
            output_dir: dir.path().join("out"),
            ..ConversionConfig::default()
        };
        let compose = ComposeConfig {
            output_dir: dir.path().join("sheets"),
        };
        let records = Arc::new(MemoryRecordStore::new());
        let orchestrator = Orchestrator::new(
            QueueConfig::default(),
            Arc::new(ConversionEngine::new(conversion, service.clone(), storage.clone())),
            Arc::new(SheetComposer::new(&compose, service, storage.clone())),
            records.clone(),
            storage,
        );
        (orchestrator, records)
    }

    async fn wait_terminal(rx: &mut broadcast::Receiver<JobEvent>) -> JobEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if matches!(event, JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. }) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_options() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let result = orchestrator
            .create_job(Vec::new(), ProcessingOptions::new(AspectRatio::new(0, 4)), "u")
            .await;
        assert!(matches!(result, Err(JobError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let files = (0..=MAX_BATCH_SIZE)
            .map(|i| FileMetadata::new(format!("/in/{i}.jpg"), format!("{i}.jpg"), 10))
            .collect();

        let result = orchestrator
            .create_job(files, ProcessingOptions::new(AspectRatio::new(1, 1)), "u")
            .await;
        assert!(matches!(
            result,
            Err(JobError::TooManyFiles { count: 51, limit: 50 })
        ));
    }

    #[tokio::test]
    async fn test_empty_job_fails() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, records) = orchestrator(&dir);
        let mut rx = orchestrator.subscribe();

        let job = orchestrator
            .create_job(Vec::new(), ProcessingOptions::new(AspectRatio::new(1, 1)), "u")
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        match wait_terminal(&mut rx).await {
            JobEvent::JobFailed { job_id, error, .. } => {
                assert_eq!(job_id, job.id);
                assert_eq!(error, JobError::NoInputFiles.to_string());
            }
            other => panic!("unexpected event {other:?}"),
        }

        let stored = orchestrator.get_job_status(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(
            records.get_job(&job.id).unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_all_images_failing_fails_job() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let mut rx = orchestrator.subscribe();
        let files = vec![
            FileMetadata::new(dir.path().join("missing.jpg"), "missing.jpg", 10),
            FileMetadata::new(dir.path().join("clip.mov"), "clip.mov", 10),
        ];

        let job = orchestrator
            .create_job(files, ProcessingOptions::new(AspectRatio::new(1, 1)), "u")
            .await
            .unwrap();

        assert!(matches!(
            wait_terminal(&mut rx).await,
            JobEvent::JobFailed { .. }
        ));
        let stored = orchestrator.get_job_status(&job.id).unwrap();
        assert_eq!(stored.failures.len(), 2);
        assert_eq!(stored.progress.processed_images, 2);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("All 2 images failed to process")
        );
    }

    #[tokio::test]
    async fn test_queue_settles_after_jobs() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let mut rx = orchestrator.subscribe();

        for _ in 0..2 {
            orchestrator
                .create_job(Vec::new(), ProcessingOptions::new(AspectRatio::new(1, 1)), "u")
                .await
                .unwrap();
        }
        wait_terminal(&mut rx).await;
        wait_terminal(&mut rx).await;

        // The last queue update follows the final terminal event.
        let mut last = None;
        while let Ok(Ok(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await
        {
            if let JobEvent::QueueUpdated { .. } = event {
                last = Some(event);
            }
        }
        assert_eq!(
            last,
            Some(JobEvent::QueueUpdated {
                queue_length: 0,
                active_jobs: 0,
                max_concurrent: 3
            })
        );
        assert_eq!(orchestrator.get_queue_status().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_finished_jobs() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, records) = orchestrator(&dir);
        let mut rx = orchestrator.subscribe();

        let job = orchestrator
            .create_job(Vec::new(), ProcessingOptions::new(AspectRatio::new(1, 1)), "u")
            .await
            .unwrap();
        wait_terminal(&mut rx).await;

        assert_eq!(orchestrator.cleanup_old_jobs(1).await.unwrap(), 0);
        assert_eq!(orchestrator.cleanup_old_jobs(0).await.unwrap(), 1);
        assert!(orchestrator.get_job_status(&job.id).is_none());
        assert!(records.get_job(&job.id).unwrap().is_none());
    }
}

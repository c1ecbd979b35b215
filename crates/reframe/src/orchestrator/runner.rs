//! Stage-by-stage execution of a single job.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::events::JobEvent;
use super::Shared;
use crate::error::JobError;
use crate::models::{
    ImageFailure, Job, JobStage, JobStatus, ProcessedImage, ProgressWeights,
};

impl Shared {
    /// Waits for a queue slot, runs the job to a terminal state and frees the slot.
    pub(super) async fn run(self: Arc<Self>, job_id: String) {
        let span = info_span!("job", job_id = %job_id);

        async {
            let Some(slot) = self.queue.acquire().await else {
                self.fail(&job_id, "job queue closed");
                self.publish_queue();
                return;
            };
            self.publish_queue();

            if let Err(e) = self.execute(&job_id).await {
                self.fail(&job_id, &e.to_string());
            }

            drop(slot);
            self.publish_queue();
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job_id: &str) -> Result<(), JobError> {
        let Some(job) = self.jobs.get(job_id) else {
            debug!("Job removed before it started");
            return Ok(());
        };
        if job.files.is_empty() {
            return Err(JobError::NoInputFiles);
        }

        let weights = ProgressWeights::for_options(&job.options);
        info!(
            files = job.files.len(),
            ratio = %job.options.aspect_ratio.name,
            "Job started"
        );

        self.transition(job_id, JobStatus::Processing, JobStage::Processing, &weights);
        let images = self.process_images(&job, &weights).await?;

        if let Some(sheet) = &job.options.sheet_composition {
            self.transition(job_id, JobStatus::Composing, JobStage::Composing, &weights);
            let sheets = self
                .composer
                .compose_sheets(&images, &sheet.grid_layout, sheet.orientation)
                .await?;
            for composed in &sheets {
                if let Err(e) = self.records.create_composed_sheet(job_id, composed) {
                    warn!(sheet = %composed.id, error = %e, "Failed to persist sheet record");
                }
            }
            self.apply(job_id, |job| {
                job.composed_sheets = sheets.clone();
                job.progress.finish_stage(JobStage::Composing, &weights);
            });

            if sheet.generate_document {
                self.transition(
                    job_id,
                    JobStatus::GeneratingDocument,
                    JobStage::GeneratingDocument,
                    &weights,
                );
                let path = self
                    .composer
                    .generate_document(&sheets, sheet.orientation)
                    .await?;
                self.apply(job_id, |job| {
                    job.document_path = Some(path.to_string_lossy().into_owned());
                    job.progress
                        .finish_stage(JobStage::GeneratingDocument, &weights);
                });
            }
        }

        self.complete(job_id);
        Ok(())
    }

    /// Converts every file with bounded parallelism. Failures are recorded on
    /// the job and do not stop the others.
    async fn process_images(
        &self,
        job: &Job,
        weights: &ProgressWeights,
    ) -> Result<Vec<ProcessedImage>, JobError> {
        let total = job.files.len();
        let timeout = self.config.per_image_timeout();
        let options = &job.options;
        let engine = &self.engine;

        let mut outcomes = stream::iter(job.files.clone().into_iter().enumerate())
            .map(|(index, file)| async move {
                let converted = tokio::time::timeout(
                    timeout,
                    engine.convert(&file, &options.aspect_ratio, options),
                )
                .await;
                let result = match converted {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(JobError::ImageTimeout {
                        file: file.original_name.clone(),
                        millis: timeout.as_millis() as u64,
                    }
                    .to_string()),
                };
                (index, file, result)
            })
            .buffer_unordered(self.config.per_image_concurrency.max(1));

        let mut succeeded: Vec<(usize, ProcessedImage)> = Vec::new();
        while let Some((index, file, result)) = outcomes.next().await {
            match result {
                Ok(image) => {
                    if let Err(e) = self.records.create_processed_image(&job.id, &image) {
                        warn!(image = %image.id, error = %e, "Failed to persist image record");
                    }
                    let snapshot = self.apply(&job.id, |j| {
                        j.processed_images.push(image.clone());
                        j.progress.record_image(weights);
                    });
                    if let Some(snapshot) = snapshot {
                        self.events.send(JobEvent::ImageProcessed {
                            job_id: job.id.clone(),
                            image_id: image.id.clone(),
                            progress: snapshot.progress.processed_images,
                            total,
                        });
                    }
                    succeeded.push((index, image));
                }
                Err(error) => {
                    warn!(file = %file.original_name, %error, "Image failed, continuing with the rest");
                    let failure = ImageFailure {
                        file_id: file.id.clone(),
                        file_name: file.original_name.clone(),
                        error,
                    };
                    self.apply(&job.id, |j| {
                        j.failures.push(failure);
                        j.progress.record_image(weights);
                    });
                }
            }
        }

        if succeeded.is_empty() {
            return Err(JobError::NoSuccessfulImages { total });
        }

        // Completion order is arbitrary; downstream stages expect input order.
        succeeded.sort_by_key(|(index, _)| *index);
        let images: Vec<ProcessedImage> = succeeded.into_iter().map(|(_, image)| image).collect();
        self.apply(&job.id, |j| {
            j.processed_images = images.clone();
            j.progress.finish_stage(JobStage::Processing, weights);
        });

        info!(
            succeeded = images.len(),
            failed = total - images.len(),
            "Image conversion finished"
        );
        Ok(images)
    }

    fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        stage: JobStage,
        weights: &ProgressWeights,
    ) {
        self.apply(job_id, |job| {
            job.status = status;
            job.progress.enter_stage(stage, weights);
        });
        debug!(%status, %stage, "Stage entered");
    }

    fn complete(&self, job_id: &str) {
        let Some(job) = self.apply(job_id, |job| {
            job.status = JobStatus::Completed;
            job.progress.complete();
            job.completed_at = Some(Utc::now());
        }) else {
            return;
        };

        info!(
            processed = job.processed_images.len(),
            failed = job.failures.len(),
            sheets = job.composed_sheets.len(),
            "Job completed"
        );
        self.events.send(JobEvent::JobCompleted {
            success: true,
            job_id: job.id,
            processed_images: job.processed_images,
            composed_sheets: job.composed_sheets,
            document_path: job.document_path,
            failures: job.failures,
        });
    }

    fn fail(&self, job_id: &str, message: &str) {
        self.apply(job_id, |job| {
            job.status = JobStatus::Failed;
            job.progress.fail();
            job.error_message = Some(message.to_string());
            job.completed_at = Some(Utc::now());
        });
        error!(error = %message, "Job failed");
        self.events.send(JobEvent::failed(job_id, message));
    }

    /// Mutates the live job, mirrors it to the record store and announces the
    /// new progress.
    fn apply<F>(&self, job_id: &str, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let job = self.jobs.update(job_id, f)?;
        if let Err(e) = self.records.update_job(&job) {
            warn!(error = %e, "Failed to persist job record");
        }
        self.events.send(JobEvent::ProgressUpdated {
            job_id: job.id.clone(),
            progress: job.progress.clone(),
        });
        Some(job)
    }

    pub(super) fn publish_queue(&self) {
        let status = self.queue.status();
        self.events.send(JobEvent::QueueUpdated {
            queue_length: status.queue_length,
            active_jobs: status.active_jobs,
            max_concurrent: status.max_concurrent,
        });
    }
}

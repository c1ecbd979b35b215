//! Job notifications and the channel that carries them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{ComposedSheet, ImageFailure, JobProgress, ProcessedImage};

/// Default channel capacity. Slow subscribers see `Lagged` rather than
/// blocking jobs.
pub const EVENT_CAPACITY: usize = 100;

/// Everything a listener can observe about the queue and its jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobEvent {
    QueueUpdated {
        queue_length: usize,
        active_jobs: usize,
        max_concurrent: usize,
    },
    ProgressUpdated {
        job_id: String,
        progress: JobProgress,
    },
    ImageProcessed {
        job_id: String,
        image_id: String,
        /// Images finished so far, failures included.
        progress: usize,
        total: usize,
    },
    JobCompleted {
        success: bool,
        job_id: String,
        processed_images: Vec<ProcessedImage>,
        composed_sheets: Vec<ComposedSheet>,
        #[serde(skip_serializing_if = "Option::is_none")]
        document_path: Option<String>,
        failures: Vec<ImageFailure>,
    },
    JobFailed {
        success: bool,
        job_id: String,
        processed_images: Vec<ProcessedImage>,
        composed_sheets: Vec<ComposedSheet>,
        error: String,
    },
}

impl JobEvent {
    pub fn failed(job_id: &str, error: impl Into<String>) -> Self {
        JobEvent::JobFailed {
            success: false,
            job_id: job_id.to_string(),
            processed_images: Vec::new(),
            composed_sheets: Vec::new(),
            error: error.into(),
        }
    }

    /// The job this event is about, if any.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            JobEvent::QueueUpdated { .. } => None,
            JobEvent::ProgressUpdated { job_id, .. }
            | JobEvent::ImageProcessed { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. } => Some(job_id),
        }
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = JobEvent::QueueUpdated {
            queue_length: 2,
            active_jobs: 1,
            max_concurrent: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "queueUpdated");
        assert_eq!(value["queueLength"], 2);
        assert_eq!(value["maxConcurrent"], 3);

        let failed = serde_json::to_value(JobEvent::failed("j1", "boom")).unwrap();
        assert_eq!(failed["type"], "jobFailed");
        assert_eq!(failed["success"], false);
        assert_eq!(failed["jobId"], "j1");
        assert_eq!(failed["processedImages"], serde_json::json!([]));
    }

    #[test]
    fn test_progress_event_round_trips() {
        let event = JobEvent::ProgressUpdated {
            job_id: "j1".into(),
            progress: JobProgress::new(4),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"progressUpdated\""));
        assert!(json.contains("\"currentStage\":\"uploading\""));
        let back: JobEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.job_id(), Some("j1"));
    }

    #[tokio::test]
    async fn test_send_without_subscribers() {
        let broadcaster = EventBroadcaster::default();
        broadcaster.send(JobEvent::failed("j1", "nobody listening"));

        let mut rx = broadcaster.subscribe();
        broadcaster.send(JobEvent::failed("j2", "heard"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), Some("j2"));
    }
}

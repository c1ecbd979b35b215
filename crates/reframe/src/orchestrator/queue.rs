//! Admission control: at most `max_concurrent` jobs run, the rest wait in
//! FIFO order on a semaphore.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub active_jobs: usize,
    pub max_concurrent: usize,
}

pub struct JobQueue {
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_concurrent: usize,
}

/// Held while a job runs. Dropping it frees the slot.
pub struct QueueSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl JobQueue {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            waiting: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_concurrent,
        }
    }

    /// Registers a job as waiting.
    pub fn enqueue(&self) {
        self.waiting.fetch_add(1, Ordering::AcqRel);
    }

    /// Waits for a free slot. Returns `None` only if the queue was closed.
    pub async fn acquire(&self) -> Option<QueueSlot> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await;
        self.waiting.fetch_sub(1, Ordering::AcqRel);
        let permit = permit.ok()?;
        self.active.fetch_add(1, Ordering::AcqRel);
        Some(QueueSlot {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.waiting.load(Ordering::Acquire),
            active_jobs: self.active.load(Ordering::Acquire),
            max_concurrent: self.max_concurrent,
        }
    }
}

//! Live job table. The orchestrator is its only writer.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::models::Job;

#[derive(Default)]
pub struct JobTable {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job table lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job table lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn insert(&self, job: Job) {
        self.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Applies `f` to the job in place and returns the updated snapshot.
    pub fn update<F>(&self, id: &str, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.write();
        let job = jobs.get_mut(id)?;
        f(job);
        Some(job.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Job> {
        self.write().remove(id)
    }

    /// Ids of jobs created strictly before `cutoff`.
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.read()
            .values()
            .filter(|job| job.created_at < cutoff)
            .map(|job| job.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

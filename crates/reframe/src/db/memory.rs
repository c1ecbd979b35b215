//! In-process record store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::{DatabaseError, RecordStore};
use crate::models::{ComposedSheet, Job, ProcessedImage};

#[derive(Default)]
struct Records {
    jobs: HashMap<String, Job>,
    images: HashMap<String, Vec<ProcessedImage>>,
    sheets: HashMap<String, Vec<ComposedSheet>>,
}

/// Keeps records in a `RwLock`ed map. Nothing survives the process.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Records>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>, DatabaseError> {
        self.records.read().map_err(|_| DatabaseError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Records>, DatabaseError> {
        self.records.write().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl RecordStore for MemoryRecordStore {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError> {
        self.write()?.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, DatabaseError> {
        Ok(self.read()?.jobs.get(id).cloned())
    }

    fn update_job(&self, job: &Job) -> Result<(), DatabaseError> {
        if let Some(stored) = self.write()?.jobs.get_mut(&job.id) {
            *stored = job.clone();
        }
        Ok(())
    }

    fn delete_job(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut records = self.write()?;
        records.images.remove(id);
        records.sheets.remove(id);
        Ok(records.jobs.remove(id).is_some())
    }

    fn create_processed_image(
        &self,
        job_id: &str,
        image: &ProcessedImage,
    ) -> Result<(), DatabaseError> {
        self.write()?
            .images
            .entry(job_id.to_string())
            .or_default()
            .push(image.clone());
        Ok(())
    }

    fn get_processed_images_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ProcessedImage>, DatabaseError> {
        Ok(self.read()?.images.get(job_id).cloned().unwrap_or_default())
    }

    fn create_composed_sheet(
        &self,
        job_id: &str,
        sheet: &ComposedSheet,
    ) -> Result<(), DatabaseError> {
        self.write()?
            .sheets
            .entry(job_id.to_string())
            .or_default()
            .push(sheet.clone());
        Ok(())
    }

    fn get_composed_sheets_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ComposedSheet>, DatabaseError> {
        Ok(self.read()?.sheets.get(job_id).cloned().unwrap_or_default())
    }

    fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, DatabaseError> {
        let mut jobs: Vec<Job> = self
            .read()?
            .jobs
            .values()
            .filter(|job| job.created_at < cutoff)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

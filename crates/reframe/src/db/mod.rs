//! Persistence for jobs and their results.
//!
//! [`RecordStore`] is the seam the orchestrator writes through.
//! [`MemoryRecordStore`] keeps everything in process; [`SqliteRecordStore`]
//! persists JSON rows through a shared [`Database`] handle.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::models::{ComposedSheet, Job, ProcessedImage};

#[cfg(test)]
pub(crate) mod contract;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use error::DatabaseError;
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Job, image and sheet records keyed by job id.
pub trait RecordStore: Send + Sync {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError>;

    fn get_job(&self, id: &str) -> Result<Option<Job>, DatabaseError>;

    /// Overwrites the stored job. Unknown ids are ignored.
    fn update_job(&self, job: &Job) -> Result<(), DatabaseError>;

    /// Removes the job together with its images and sheets. Returns whether
    /// anything was removed.
    fn delete_job(&self, id: &str) -> Result<bool, DatabaseError>;

    fn create_processed_image(
        &self,
        job_id: &str,
        image: &ProcessedImage,
    ) -> Result<(), DatabaseError>;

    fn get_processed_images_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ProcessedImage>, DatabaseError>;

    fn create_composed_sheet(&self, job_id: &str, sheet: &ComposedSheet)
        -> Result<(), DatabaseError>;

    fn get_composed_sheets_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ComposedSheet>, DatabaseError>;

    /// Jobs created strictly before `cutoff`, oldest first.
    fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, DatabaseError>;
}

/// Thread-safe handle around a single rusqlite connection. Cloning shares it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file and applies pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

//! SQLite-backed record store. Records are stored whole as JSON next to the
//! columns used for lookups.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use serde::de::DeserializeOwned;

use super::{Database, DatabaseError, RecordStore};
use crate::models::{ComposedSheet, Job, ProcessedImage};

pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn query_json<T: DeserializeOwned>(
        &self,
        sql: &str,
        key: &str,
    ) -> Result<Vec<T>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for data in rows {
                out.push(serde_json::from_str(&data?)?);
            }
            Ok(out)
        })
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl RecordStore for SqliteRecordStore {
    fn create_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(job)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (id, user_id, status, created_at, updated_at, completed_at,
                 error_message, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id,
                    job.user_id,
                    job.status.as_str(),
                    timestamp(&job.created_at),
                    timestamp(&Utc::now()),
                    job.completed_at.as_ref().map(timestamp),
                    job.error_message,
                    data,
                ],
            )?;
            Ok(())
        })
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, DatabaseError> {
        Ok(self
            .query_json("SELECT data FROM jobs WHERE id = ?1", id)?
            .into_iter()
            .next())
    }

    fn update_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(job)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status=?2, updated_at=?3, completed_at=?4, error_message=?5,
                 data=?6 WHERE id=?1",
                params![
                    job.id,
                    job.status.as_str(),
                    timestamp(&Utc::now()),
                    job.completed_at.as_ref().map(timestamp),
                    job.error_message,
                    data,
                ],
            )?;
            Ok(())
        })
    }

    fn delete_job(&self, id: &str) -> Result<bool, DatabaseError> {
        self.db.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
    }

    fn create_processed_image(
        &self,
        job_id: &str,
        image: &ProcessedImage,
    ) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(image)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO processed_images (id, job_id, original_file_id, output_path,
                 created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    image.id,
                    job_id,
                    image.original_file_id,
                    image.output_path.to_string_lossy().into_owned(),
                    timestamp(&Utc::now()),
                    data,
                ],
            )?;
            Ok(())
        })
    }

    fn get_processed_images_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ProcessedImage>, DatabaseError> {
        self.query_json(
            "SELECT data FROM processed_images WHERE job_id = ?1 ORDER BY rowid",
            job_id,
        )
    }

    fn create_composed_sheet(
        &self,
        job_id: &str,
        sheet: &ComposedSheet,
    ) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(sheet)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO composed_sheets (id, job_id, output_path, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sheet.id,
                    job_id,
                    sheet.output_path.to_string_lossy().into_owned(),
                    timestamp(&Utc::now()),
                    data,
                ],
            )?;
            Ok(())
        })
    }

    fn get_composed_sheets_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ComposedSheet>, DatabaseError> {
        self.query_json(
            "SELECT data FROM composed_sheets WHERE job_id = ?1 ORDER BY rowid",
            job_id,
        )
    }

    fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, DatabaseError> {
        self.query_json(
            "SELECT data FROM jobs WHERE created_at < ?1 ORDER BY created_at",
            &timestamp(&cutoff),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::contract;

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_job_lifecycle() {
        contract::job_lifecycle(&store());
    }

    #[test]
    fn test_children_follow_job() {
        contract::children_follow_job(&store());
    }

    #[test]
    fn test_created_before() {
        contract::created_before(&store());
    }

    #[test]
    fn test_status_column_tracks_updates() {
        let store = store();
        let mut job = contract::job();
        store.create_job(&job).unwrap();
        job.status = crate::models::JobStatus::Failed;
        job.error_message = Some("No images were processed".into());
        store.update_job(&job).unwrap();

        let (status, error): (String, Option<String>) = store
            .database()
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT status, error_message FROM jobs WHERE id = ?1",
                    params![job.id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(error.as_deref(), Some("No images were processed"));
    }

    #[test]
    fn test_image_requires_existing_job() {
        let store = store();
        let result = store.create_processed_image("nope", &contract::image("x"));
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let job = contract::job();
        {
            let store = SqliteRecordStore::new(Database::open(&path).unwrap());
            store.create_job(&job).unwrap();
            store.create_composed_sheet(&job.id, &contract::sheet("s")).unwrap();
        }

        let store = SqliteRecordStore::new(Database::open(&path).unwrap());
        assert_eq!(store.get_job(&job.id).unwrap(), Some(job.clone()));
        assert_eq!(store.get_composed_sheets_by_job_id(&job.id).unwrap().len(), 1);
    }
}

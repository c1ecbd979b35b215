//! Behaviour every [`RecordStore`] must share, run against each implementation.

use std::path::PathBuf;

use chrono::{Duration, Utc};

use super::RecordStore;
use crate::models::{
    AspectRatio, ComposedSheet, CropArea, CropSource, DetectionResult, FileMetadata, GridLayout,
    Job, JobStatus, Orientation, ProcessedImage, ProcessingOptions,
};

pub fn job() -> Job {
    let file = FileMetadata::new("/in/a.jpg", "a.jpg", 1024);
    Job::new(vec![file], ProcessingOptions::new(AspectRatio::new(4, 6)), "user-1")
}

pub fn image(id: &str) -> ProcessedImage {
    ProcessedImage {
        id: id.to_string(),
        original_file_id: "file".into(),
        output_path: PathBuf::from(format!("/out/{}.jpg", id)),
        crop_area: CropArea {
            x: 0,
            y: 10,
            width: 400,
            height: 600,
            confidence: 0.5,
        },
        aspect_ratio: AspectRatio::new(4, 6),
        detections: DetectionResult::empty(),
        processing_time_ms: 12,
        output_width: 800,
        output_height: 1200,
        upscale_factor: 2.0,
        quality_score: 55.0,
        crop_source: CropSource::Local,
        captions: None,
    }
}

pub fn sheet(id: &str) -> ComposedSheet {
    ComposedSheet {
        id: id.to_string(),
        output_path: PathBuf::from(format!("/sheets/{}.jpg", id)),
        grid_layout: GridLayout::new(2, 2).unwrap(),
        orientation: Orientation::Portrait,
        images: vec!["a".into(), "b".into()],
        empty_slots: 2,
    }
}

pub fn job_lifecycle(store: &dyn RecordStore) {
    let mut job = job();
    store.create_job(&job).unwrap();
    assert_eq!(store.get_job(&job.id).unwrap().as_ref(), Some(&job));

    job.status = JobStatus::Completed;
    job.progress.complete();
    job.completed_at = Some(Utc::now());
    store.update_job(&job).unwrap();
    let loaded = store.get_job(&job.id).unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Completed);
    assert_eq!(loaded.progress.percentage, 100.0);

    assert!(store.delete_job(&job.id).unwrap());
    assert!(store.get_job(&job.id).unwrap().is_none());
    assert!(!store.delete_job(&job.id).unwrap());
    assert!(store.get_job("missing").unwrap().is_none());
}

pub fn children_follow_job(store: &dyn RecordStore) {
    let job = job();
    store.create_job(&job).unwrap();
    store.create_processed_image(&job.id, &image("one")).unwrap();
    store.create_processed_image(&job.id, &image("two")).unwrap();
    store.create_composed_sheet(&job.id, &sheet("s1")).unwrap();

    let images = store.get_processed_images_by_job_id(&job.id).unwrap();
    let ids: Vec<&str> = images.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["one", "two"]);
    assert_eq!(images[0], image("one"));
    assert_eq!(
        store.get_composed_sheets_by_job_id(&job.id).unwrap(),
        vec![sheet("s1")]
    );

    store.delete_job(&job.id).unwrap();
    assert!(store.get_processed_images_by_job_id(&job.id).unwrap().is_empty());
    assert!(store.get_composed_sheets_by_job_id(&job.id).unwrap().is_empty());
}

pub fn created_before(store: &dyn RecordStore) {
    let mut old = job();
    old.created_at = Utc::now() - Duration::hours(48);
    let fresh = job();
    store.create_job(&old).unwrap();
    store.create_job(&fresh).unwrap();

    let cutoff = Utc::now() - Duration::hours(24);
    let stale: Vec<String> = store
        .jobs_created_before(cutoff)
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(stale, vec![old.id]);
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::Storage;
use crate::error::StorageError;

/// Local filesystem storage. Writes go through a temporary sibling file and a
/// rename so readers never observe a half-written image.
#[derive(Debug, Clone, Default)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let temp_name = format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple());
    path.with_file_name(temp_name)
}

#[async_trait]
impl Storage for FileStorage {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_directory(parent).await?;
        }

        let temp = temp_path_for(path);
        let write_err = |e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        };

        tokio::fs::write(&temp, bytes).await.map_err(write_err)?;

        if let Err(e) = tokio::fs::rename(&temp, path).await {
            log::debug!(
                "Rename of {} failed ({}), falling back to direct write",
                temp.display(),
                e
            );
            let _ = tokio::fs::remove_file(&temp).await;
            tokio::fs::write(path, bytes).await.map_err(write_err)?;
        }

        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                log::debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

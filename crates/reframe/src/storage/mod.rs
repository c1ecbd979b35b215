//! Storage collaborator: opaque-path byte I/O used by the engine and composer.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

pub mod filesystem;

pub use filesystem::FileStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Writes `bytes` to `path`, replacing any previous content.
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    async fn exists(&self, path: &Path) -> bool;

    /// Removes `path`. Deleting a missing file is not an error.
    async fn delete(&self, path: &Path) -> Result<(), StorageError>;
}

//! File Persistence
//!
//! JSON files on disk that are replaced atomically: content goes to a
//! sibling temp file which is then renamed over the target, so a crash
//! never leaves a partially written record behind.

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug, Clone)]
pub enum PersistError {
    #[error("Failed to serialize record: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize record: {0}")]
    DeserializationError(String),

    #[error("Failed to write file: {0}")]
    WriteError(String),

    #[error("Failed to read file: {0}")]
    ReadError(String),

    #[error("Failed to delete file: {0}")]
    DeleteError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Write and flush to disk before the file is renamed into place
async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

/// Serialize `value` and atomically replace `path` with it
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistError::DirectoryError(e.to_string()))?;
    }

    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| PersistError::SerializationError(e.to_string()))?;

    let tmp = temp_path(path);
    if let Err(e) = write_synced(&tmp, &content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PersistError::WriteError(e.to_string()));
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PersistError::WriteError(e.to_string()));
    }

    Ok(())
}

/// Read a JSON file. Missing or empty files are `None`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::ReadError(e.to_string())),
    };

    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PersistError::DeserializationError(e.to_string()))
}

/// Delete a file; deleting a missing file is not an error
pub async fn delete_file(path: &Path) -> Result<bool, PersistError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PersistError::DeleteError(e.to_string())),
    }
}

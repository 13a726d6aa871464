use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, info};

use crate::errors::ServiceError;

/// A JSON document persisted as a single file and always rewritten whole.
///
/// Writes go to a sibling staging file which is flushed to disk and then
/// renamed over the document, so a reader never observes a half-written
/// file. The type does no locking of its own; callers serialize access.
#[derive(Debug)]
pub struct JsonDocumentFile {
    path: PathBuf,
    staging: PathBuf,
}

impl JsonDocumentFile {
    /// Open the document at `path`, writing `empty` if the file does not exist.
    /// An existing file is left untouched, even if it turns out to be invalid.
    pub async fn open_or_init<T: Serialize>(
        path: impl Into<PathBuf>,
        empty: &T,
    ) -> Result<Self, ServiceError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::storage("create data directory", e))?;
        }

        let file = Self { staging: staging_path(&path), path };
        match fs::metadata(&file.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                file.replace(empty).await?;
                info!(path = %file.path.display(), "initialized empty document");
            }
            Err(e) => return Err(file.fail("stat document", e)),
        }
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole file.
    pub async fn read<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        let bytes = fs::read(&self.path).await.map_err(|e| self.fail("read document", e))?;
        serde_json::from_slice(&bytes).map_err(|e| self.fail("parse document", e))
    }

    /// Replace the file content with the full serialization of `value`.
    pub async fn replace<T: Serialize>(&self, value: &T) -> Result<(), ServiceError> {
        let mut data =
            serde_json::to_vec_pretty(value).map_err(|e| self.fail("serialize document", e))?;
        data.push(b'\n');

        let mut staging =
            fs::File::create(&self.staging).await.map_err(|e| self.fail("create staging file", e))?;
        staging.write_all(&data).await.map_err(|e| self.fail("write staging file", e))?;
        staging.sync_all().await.map_err(|e| self.fail("sync staging file", e))?;
        drop(staging);

        fs::rename(&self.staging, &self.path)
            .await
            .map_err(|e| self.fail("replace document", e))?;
        debug!(path = %self.path.display(), bytes = data.len(), "document written");
        Ok(())
    }

    fn fail(&self, context: &str, err: impl std::fmt::Display) -> ServiceError {
        error!(path = %self.path.display(), error = %err, "{context} failed");
        ServiceError::storage(context, err)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

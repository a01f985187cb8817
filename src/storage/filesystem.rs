use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::BlobStore;
use crate::error::{PromoteError, Result};

/// Blob store rooted at a local directory. Blob paths map to files beneath the root.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
}

impl FileSystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            return Err(PromoteError::Storage(format!(
                "path escapes store root: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn to_blob_path(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }

    async fn collect_files(&self, start: PathBuf) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                } else {
                    files.push(entry.path());
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(path)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so readers never observe a partial file
        let staging = target.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let staged = match fs::write(&staging, bytes).await {
            Ok(()) => fs::rename(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %staging.display(), error = %cleanup, "Could not remove staging file");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let start = self.resolve(prefix)?;
        let metadata = match fs::metadata(&start).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let files = if metadata.is_dir() {
            self.collect_files(start).await?
        } else {
            vec![start]
        };

        let mut paths: Vec<String> = files
            .iter()
            .filter_map(|file| self.to_blob_path(file))
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, prefix: &str) -> Result<u64> {
        let target = self.resolve(prefix)?;
        let metadata = match fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            let removed = self.collect_files(target.clone()).await?.len() as u64;
            fs::remove_dir_all(&target).await?;
            debug!(prefix = %prefix, removed = removed, "Deleted blob subtree");
            Ok(removed)
        } else {
            fs::remove_file(&target).await?;
            Ok(1)
        }
    }
}

use anyhow::{Context, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Flat-file persistence under a single root. The directory tree is the
/// index: an entry is present when its files are.
#[derive(Debug, Clone)]
pub struct ArtifactRepo {
    root: PathBuf,
}

impl ArtifactRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `dir` and its parents. An existing directory is success.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        match fs::create_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to create cache directory: {}", dir.display())),
        }
    }

    pub async fn is_file(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    pub async fn all_present(&self, paths: &[PathBuf]) -> bool {
        for path in paths {
            if !self.is_file(path).await {
                return false;
            }
        }
        true
    }

    /// Writes to a sibling temp file and renames it into place, so readers
    /// only ever observe complete files.
    pub async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Invalid artifact path: {}", path.display()))?;
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to write {}", path.display()));
        }
        Ok(())
    }

    pub async fn read(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    /// Removes the given files; files that are already gone are ignored.
    pub async fn remove_files(&self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

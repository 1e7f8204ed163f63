//! Asset Store
//!
//! Persists binary blobs as flat files under a configured root directory,
//! keyed by storage key. Every resolution is checked twice: lexically against
//! the normalized root before touching the disk, and physically (after
//! symlink resolution) against the canonical root.

use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::types::{AppError, AppResult};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// File content plus the content type to serve it with.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Flat-namespace blob store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Create a store rooted at `root`. Relative roots are anchored at the
    /// current working directory. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        let absolute = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };

        Ok(Self {
            root: normalize(&absolute),
        })
    }

    /// A store for a distinct asset class living in a named sub-root.
    pub fn scoped(&self, name: &str) -> AppResult<Self> {
        let sub = self.resolve(name)?;
        Ok(Self { root: sub })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under `key`, replacing any existing file.
    pub async fn store(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let target = self.resolve(key)?;

        fs::create_dir_all(&self.root).await.map_err(|e| {
            error!(root = %self.root.display(), error = %e, "Failed to create asset root");
            AppError::Io(e)
        })?;
        self.ensure_physically_contained(key, &target).await?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = self
            .root
            .join(format!(".{}.{}.part", key, hex::encode(rand::random::<[u8; 4]>())));
        if let Err(e) = fs::write(&staging, data).await {
            error!(key, error = %e, "Failed to write asset");
            let _ = fs::remove_file(&staging).await;
            return Err(AppError::Io(e));
        }
        if let Err(e) = fs::rename(&staging, &target).await {
            error!(key, error = %e, "Failed to move asset into place");
            let _ = fs::remove_file(&staging).await;
            return Err(AppError::Io(e));
        }

        debug!(key, size = data.len(), "Stored asset");
        Ok(())
    }

    /// Read the whole file stored under `key`.
    pub async fn fetch(&self, key: &str) -> AppResult<FetchedAsset> {
        let target = self.resolve(key)?;

        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(AppError::NotFound(format!("asset {}", key))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("asset {}", key)));
            }
            Err(e) => return Err(AppError::Io(e)),
        }
        self.ensure_physically_contained(key, &target).await?;

        let data = fs::read(&target).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!("asset {}", key)),
            _ => {
                error!(key, error = %e, "Failed to read asset");
                AppError::Io(e)
            }
        })?;

        let content_type = content_type_for(key, &data);
        Ok(FetchedAsset {
            bytes: Bytes::from(data),
            content_type,
        })
    }

    /// Whether a regular file is stored under `key`.
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let target = self.resolve(key)?;
        match fs::metadata(&target).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Remove the file under `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let target = self.resolve(key)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                info!(key, "Deleted asset");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Lexical resolution: the key must name a direct child of the root.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let candidate = normalize(&self.root.join(key));
        if key.is_empty() || candidate.parent() != Some(self.root.as_path()) {
            warn!(
                key,
                root = %self.root.display(),
                "Storage key resolves outside the asset root"
            );
            return Err(AppError::PathViolation(format!(
                "key {:?} escapes the asset root",
                key
            )));
        }
        Ok(candidate)
    }

    /// Physical resolution: symlinks under the root must not lead out of it.
    async fn ensure_physically_contained(&self, key: &str, target: &Path) -> AppResult<()> {
        let root = match fs::canonicalize(&self.root).await {
            Ok(root) => root,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("asset {}", key)));
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let resolved = match fs::canonicalize(target).await {
            Ok(resolved) => resolved,
            // Nothing at the target yet: the lexical check already holds.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AppError::Io(e)),
        };

        if !resolved.starts_with(&root) {
            warn!(
                key,
                resolved = %resolved.display(),
                root = %root.display(),
                "Storage key resolves outside the asset root"
            );
            return Err(AppError::PathViolation(format!(
                "key {:?} escapes the asset root",
                key
            )));
        }
        Ok(())
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Content type from the key's extension, then from magic bytes.
fn content_type_for(key: &str, data: &[u8]) -> String {
    if let Some(guess) = mime_guess::from_path(key).first() {
        return guess.essence_str().to_string();
    }
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

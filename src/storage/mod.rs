mod resize;
mod validation;

use std::path::{Component, Path, PathBuf};

pub use self::resize::{fit_within, fit_within_blocking};
pub use self::validation::{avatar_policy, extension_for, media_policy, UploadError, UploadPolicy};

/// Top-level folders inside the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Avatars,
    Media,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::Media => "media",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub public_url: String,
    pub size: u64,
}

/// Uploaded files on local disk, served back under a public URL prefix.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_base: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the bucket directories.
    pub async fn init(&self) -> Result<(), StorageError> {
        for bucket in [Bucket::Avatars, Bucket::Media] {
            tokio::fs::create_dir_all(self.root.join(bucket.as_str())).await?;
        }
        Ok(())
    }

    /// Write `data` under a fresh, unguessable key.
    pub async fn put(
        &self,
        bucket: Bucket,
        extension: &str,
        data: &[u8],
    ) -> Result<StoredObject, StorageError> {
        let extension = extension.trim_start_matches('.');
        let key = if extension.is_empty() {
            format!("{}/{}", bucket.as_str(), uuid::Uuid::now_v7())
        } else {
            format!("{}/{}.{}", bucket.as_str(), uuid::Uuid::now_v7(), extension)
        };

        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        tracing::debug!(key = %key, size = data.len(), "Stored object");
        Ok(StoredObject {
            public_url: self.public_url(&key),
            key,
            size: data.len() as u64,
        })
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::read(path).await?)
    }

    /// Remove an object. Deleting a key that is already gone succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    /// Reverse of [`public_url`](Self::public_url), for URLs this store issued.
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_base)?.strip_prefix('/')?;
        self.path_for(key).ok().map(|_| key.to_string())
    }

    /// Resolve a key to a path under the root. Only plain relative segments are accepted.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;

/// Attachments above this size are rejected before anything is written.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Public URL the file is served under.
    pub url: String,
    /// The uploader's original filename, kept for display.
    pub file_name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file exceeds the {MAX_FILE_BYTES} byte limit")]
    TooLarge,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores the bytes under a per-user, timestamp-named key and returns the
    /// public URL together with the original filename.
    async fn store(
        &self,
        user_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StoreError>;
}

/// Disk-backed store: `{root}/{user_id}/{millis}-{rand}.{ext}`, served at
/// `{public_base}/{user_id}/{key}`.
pub struct DiskStore {
    root: PathBuf,
    public_base: String,
}

impl DiskStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.upload_dir),
            public_base: config.public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn store(
        &self,
        user_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StoreError> {
        if bytes.len() > MAX_FILE_BYTES {
            return Err(StoreError::TooLarge);
        }

        // The millisecond stem alone collides for rapid uploads, so a random
        // fragment disambiguates the key
        let stem = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let key = match original_name.rsplit('.').next().filter(|ext| {
            !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }) {
            Some(ext) if original_name.contains('.') => format!("{}.{}", stem, ext),
            _ => stem,
        };

        let dir = self.root.join(user_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&key), bytes).await?;

        info!("Stored file {} for user {}", key, user_id);

        Ok(StoredFile {
            url: format!("{}/{}/{}", self.public_base, user_id, key),
            file_name: original_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(dir: &std::path::Path) -> DiskStore {
        DiskStore::new(&StorageConfig {
            upload_dir: dir.to_string_lossy().to_string(),
            public_base: "http://localhost:8080/files/".to_string(),
        })
    }

    #[tokio::test]
    async fn stores_under_user_prefix_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let user = Uuid::new_v4();

        let stored = store.store(user, "manual.pdf", b"hello").await.unwrap();

        assert_eq!(stored.file_name, "manual.pdf");
        assert!(stored.url.starts_with(&format!("http://localhost:8080/files/{}/", user)));
        assert!(stored.url.ends_with(".pdf"));

        let key = stored.url.rsplit('/').next().unwrap();
        let on_disk = dir.path().join(user.to_string()).join(key);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn repeated_uploads_of_one_name_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let user = Uuid::new_v4();

        // Back to back, so the millisecond timestamps almost certainly tie
        let first = store.store(user, "manual.pdf", b"one").await.unwrap();
        let second = store.store(user, "manual.pdf", b"two").await.unwrap();

        assert_ne!(first.url, second.url);

        let read = |stored: &StoredFile| {
            let key = stored.url.rsplit('/').next().unwrap();
            std::fs::read(dir.path().join(user.to_string()).join(key)).unwrap()
        };
        assert_eq!(read(&first), b"one");
        assert_eq!(read(&second), b"two");
    }

    #[tokio::test]
    async fn rejects_oversized_files_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let user = Uuid::new_v4();

        let big = vec![0u8; MAX_FILE_BYTES + 1];
        let err = store.store(user, "huge.bin", &big).await.unwrap_err();
        assert!(matches!(err, StoreError::TooLarge));
        assert!(!dir.path().join(user.to_string()).exists());
    }
}

use crate::config::ServerConfig;
use crate::services::storage::{LocalStorageService, StorageError, StoredFile};
use crate::utils::naming::generate_stored_name;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::info;

pub struct UploadService {
    storage: Arc<LocalStorageService>,
    max_file_size: usize,
}

impl UploadService {
    pub fn new(storage: Arc<LocalStorageService>, config: &ServerConfig) -> Self {
        Self {
            storage,
            max_file_size: config.max_file_size,
        }
    }

    /// Streams one uploaded file to disk under a fresh
    /// `<basename>-<ms>-<random><ext>` name derived from `original_name`.
    pub async fn store<R>(&self, original_name: &str, reader: R) -> Result<StoredFile, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staged = self.storage.stage(reader, self.max_file_size).await?;

        let original = original_name.to_string();
        let stored = self
            .storage
            .commit(staged, move || generate_stored_name(&original))
            .await?;

        info!(
            "💾 Stored '{}' as {} ({} bytes)",
            original_name, stored.name, stored.size
        );
        Ok(stored)
    }

    /// Removes a file stored earlier in a request that later failed
    pub async fn discard(&self, file: &StoredFile) -> Result<(), StorageError> {
        self.storage.delete_file(&file.name).await?;
        info!("🗑️  Discarded {}", file.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(max_file_size: usize) -> (tempfile::TempDir, UploadService) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::development(dir.path());
        config.max_file_size = max_file_size;
        let storage = Arc::new(LocalStorageService::new(dir.path().to_path_buf()));
        (dir, UploadService::new(storage, &config))
    }

    #[tokio::test]
    async fn test_store_uses_unique_name() {
        let (dir, service) = service(1024);
        let stored = service.store("notes.txt", &b"some notes"[..]).await.unwrap();

        assert!(stored.name.starts_with("notes-"));
        assert!(stored.name.ends_with(".txt"));
        assert_ne!(stored.name, "notes.txt");
        assert_eq!(stored.size, 10);
        assert_eq!(stored.path, dir.path().join(&stored.name));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"some notes");
    }

    #[tokio::test]
    async fn test_store_same_name_twice() {
        let (_dir, service) = service(1024);
        let first = service.store("dup.bin", &b"one"[..]).await.unwrap();
        let second = service.store("dup.bin", &b"two"[..]).await.unwrap();
        assert_ne!(first.name, second.name);
    }

    #[tokio::test]
    async fn test_store_rejects_oversized() {
        let (dir, service) = service(4);
        let err = service.store("big.txt", &b"too big"[..]).await.err().unwrap();
        assert!(matches!(err, StorageError::TooLarge { limit: 4 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_discard() {
        let (dir, service) = service(1024);
        let stored = service.store("gone.txt", &b"x"[..]).await.unwrap();
        service.discard(&stored).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Names tried by `commit` before giving up
pub const COMMIT_ATTEMPTS: usize = 3;

/// Upload content written to a hidden temporary file inside the storage
/// directory. Dropping it without committing removes the file.
pub struct StagedFile {
    path: TempPath,
    pub size: u64,
}

pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Flat directory store for uploaded files
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    /// `root` should be absolute so reported paths are too.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Streams `reader` into a temp file, failing as soon as more than
    /// `max_size` bytes have been read.
    pub async fn stage<R>(&self, mut reader: R, max_size: usize) -> Result<StagedFile, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let temp_file = NamedTempFile::new_in(&self.root)?;
        let mut file = tokio::fs::File::from_std(temp_file.reopen()?);
        let path = temp_file.into_temp_path();

        let mut buffer = vec![0u8; 64 * 1024];
        let mut total_size: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            total_size += n as u64;
            if total_size > max_size as u64 {
                // `path` drops here and removes the partial file
                return Err(StorageError::TooLarge { limit: max_size });
            }
            file.write_all(&buffer[..n]).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(StagedFile {
            path,
            size: total_size,
        })
    }

    /// Moves a staged file to the first name from `make_name` that is not
    /// taken yet, trying at most `COMMIT_ATTEMPTS` names. Never replaces an
    /// existing file.
    pub async fn commit<F>(&self, staged: StagedFile, mut make_name: F) -> Result<StoredFile, StorageError>
    where
        F: FnMut() -> String + Send + 'static,
    {
        let root = self.root.clone();
        let size = staged.size;
        let mut temp_path = staged.path;

        tokio::task::spawn_blocking(move || {
            let mut last_name = String::new();
            for _ in 0..COMMIT_ATTEMPTS {
                let name = make_name();
                let target = root.join(&name);
                match temp_path.persist_noclobber(&target) {
                    Ok(()) => {
                        return Ok(StoredFile {
                            name,
                            path: target,
                            size,
                        });
                    }
                    Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                        tracing::warn!("Stored name collision on {}, retrying", name);
                        temp_path = e.path;
                        last_name = name;
                    }
                    // The returned TempPath drops here and removes the staged file
                    Err(e) => return Err(StorageError::Io(e.error)),
                }
            }
            Err(StorageError::AlreadyExists(last_name))
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    pub async fn delete_file(&self, name: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.root.join(name)).await?;
        Ok(())
    }

    #[cfg(test)]
    async fn file_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.root.join(name)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, LocalStorageService) {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalStorageService::new(dir.path().to_path_buf());
        (dir, service)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_stage_and_commit() {
        let (dir, storage) = storage();
        let staged = storage.stage(&b"hello world"[..], 1024).await.unwrap();
        assert_eq!(staged.size, 11);

        let stored = storage.commit(staged, || "hello.txt".to_string()).await.unwrap();
        assert_eq!(stored.size, 11);
        assert_eq!(stored.path, dir.path().join("hello.txt"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"hello world");
        assert_eq!(entries(dir.path()), vec!["hello.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_stage_rejects_oversized_input() {
        let (dir, storage) = storage();
        let data = vec![7u8; 2048];
        let err = storage.stage(&data[..], 1024).await.err().unwrap();
        assert!(matches!(err, StorageError::TooLarge { limit: 1024 }));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_stage_accepts_exact_limit() {
        let (_dir, storage) = storage();
        let data = vec![1u8; 1024];
        let staged = storage.stage(&data[..], 1024).await.unwrap();
        assert_eq!(staged.size, 1024);
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing() {
        let (dir, storage) = storage();
        let staged = storage.stage(&b"abc"[..], 1024).await.unwrap();
        drop(staged);
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_commit_never_overwrites() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("taken.txt"), b"original").unwrap();

        let staged = storage.stage(&b"new"[..], 1024).await.unwrap();
        let err = storage
            .commit(staged, || "taken.txt".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(std::fs::read(dir.path().join("taken.txt")).unwrap(), b"original");
        assert_eq!(entries(dir.path()), vec!["taken.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_commit_retries_with_fresh_name() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("a.txt"), b"original").unwrap();

        let mut names = vec!["b.txt", "a.txt"];
        let staged = storage.stage(&b"new"[..], 1024).await.unwrap();
        let stored = storage
            .commit(staged, move || names.pop().unwrap().to_string())
            .await
            .unwrap();

        assert_eq!(stored.name, "b.txt");
        assert_eq!(std::fs::read(dir.path().join("b.txt")).unwrap(), b"new");
        assert_eq!(
            entries(dir.path()),
            vec!["a.txt".to_string(), "b.txt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (_dir, storage) = storage();
        let staged = storage.stage(&b"bye"[..], 1024).await.unwrap();
        storage.commit(staged, || "bye.txt".to_string()).await.unwrap();
        assert!(storage.file_exists("bye.txt").await.unwrap());

        storage.delete_file("bye.txt").await.unwrap();
        assert!(!storage.file_exists("bye.txt").await.unwrap());
    }
}

use crate::config::ServerConfig;
use crate::services::storage::LocalStorageService;
use std::sync::Arc;
use tracing::info;

/// Creates the storage directory if needed and returns a service rooted at
/// its absolute path.
pub async fn setup_storage(config: &ServerConfig) -> std::io::Result<Arc<LocalStorageService>> {
    let dir = &config.storage_dir;
    if !tokio::fs::try_exists(dir).await? {
        tokio::fs::create_dir_all(dir).await?;
        info!("📁 Created uploads directory at {}", dir.display());
    }

    let root = tokio::fs::canonicalize(dir).await?;
    info!("📂 Uploads directory: {}", root.display());
    Ok(Arc::new(LocalStorageService::new(root)))
}

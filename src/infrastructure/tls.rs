use crate::config::TlsConfig;
use axum_server::tls_rustls::RustlsConfig;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TlsSetupError {
    #[error("TLS directory {} did not exist and has been created", .0.display())]
    DirectoryCreated(PathBuf),

    #[error("TLS file {} is missing", .0.display())]
    MissingFile(PathBuf),

    #[error("Invalid TLS credentials: {0}")]
    Invalid(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operator-facing steps for providing a key pair
pub fn instructions(config: &TlsConfig) -> Vec<String> {
    let key = config.key_path();
    let cert = config.cert_path();
    vec![
        format!(
            "Please add your SSL certificates to the {} directory:",
            config.dir.display()
        ),
        format!("- {}: Your private key", key.display()),
        format!("- {}: Your certificate", cert.display()),
        "You can generate self-signed certificates with this command:".to_string(),
        format!(
            "openssl req -x509 -newkey rsa:2048 -keyout {} -out {} -days 365 -nodes",
            key.display(),
            cert.display()
        ),
    ]
}

/// Verifies the credential directory and both PEM files exist. A missing
/// directory is created so the operator knows where to put them.
pub async fn check_credentials(config: &TlsConfig) -> Result<(), TlsSetupError> {
    if !tokio::fs::try_exists(&config.dir).await? {
        tokio::fs::create_dir_all(&config.dir).await?;
        info!("📁 Created ssl directory at {}", config.dir.display());
        return Err(TlsSetupError::DirectoryCreated(config.dir.clone()));
    }

    for path in [config.key_path(), config.cert_path()] {
        if !tokio::fs::try_exists(&path).await? {
            return Err(TlsSetupError::MissingFile(path));
        }
    }
    Ok(())
}

/// Loads the key pair for the HTTPS listener
pub async fn load_rustls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsSetupError> {
    check_credentials(config).await?;

    let tls = RustlsConfig::from_pem_file(config.cert_path(), config.key_path())
        .await
        .map_err(TlsSetupError::Invalid)?;
    info!(
        "🔒 Loaded TLS certificate {} and key {}",
        config.cert_path().display(),
        config.key_path().display()
    );
    Ok(tls)
}

use std::env;
use std::path::PathBuf;

/// Runtime configuration shared by the upload server and the merge tool
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port (default: 5044)
    pub port: u16,

    /// Directory uploads are written into (default: "uploads")
    pub storage_dir: PathBuf,

    /// Maximum file size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Transport security settings
    pub tls: TlsConfig,

    /// File name of the merged CSV inside the storage directory (default: "all.csv")
    pub merge_output: String,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Serve HTTPS (default: true)
    pub enabled: bool,

    /// Directory holding key.pem and cert.pem (default: "ssl")
    pub dir: PathBuf,
}

impl TlsConfig {
    pub fn key_path(&self) -> PathBuf {
        self.dir.join("key.pem")
    }

    pub fn cert_path(&self) -> PathBuf {
        self.dir.join("cert.pem")
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("ssl"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5044,
            storage_dir: PathBuf::from("uploads"),
            max_file_size: 50 * 1024 * 1024, // 50 MB
            tls: TlsConfig::default(),
            merge_output: "all.csv".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.storage_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            tls: TlsConfig {
                enabled: env::var("ENABLE_TLS")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.tls.enabled),
                dir: env::var("TLS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(default.tls.dir),
            },

            merge_output: env::var("MERGE_OUTPUT").unwrap_or(default.merge_output),
        }
    }

    /// Plain HTTP config rooted at `storage_dir`, used by tests and local runs
    pub fn development(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            tls: TlsConfig {
                enabled: false,
                ..TlsConfig::default()
            },
            ..Self::default()
        }
    }

    /// Size limit rendered for client-facing messages, e.g. "50MB"
    pub fn max_file_size_label(&self) -> String {
        const MB: usize = 1024 * 1024;
        if self.max_file_size >= MB && self.max_file_size % MB == 0 {
            format!("{}MB", self.max_file_size / MB)
        } else {
            format!("{} bytes", self.max_file_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5044);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.storage_dir, PathBuf::from("uploads"));
        assert_eq!(config.merge_output, "all.csv");
        assert!(config.tls.enabled);
    }

    #[test]
    fn test_tls_paths() {
        let tls = TlsConfig::default();
        assert_eq!(tls.key_path(), PathBuf::from("ssl").join("key.pem"));
        assert_eq!(tls.cert_path(), PathBuf::from("ssl").join("cert.pem"));
    }

    #[test]
    fn test_development_config() {
        let config = ServerConfig::development("/tmp/uploads");
        assert!(!config.tls.enabled);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.max_file_size_label(), "50MB");
    }

    #[test]
    fn test_size_label_for_odd_limits() {
        let mut config = ServerConfig::default();
        config.max_file_size = 1024;
        assert_eq!(config.max_file_size_label(), "1024 bytes");
    }
}

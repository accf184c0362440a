use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uploader::config::ServerConfig;
use uploader::infrastructure::{storage, tls};
use uploader::services::upload_service::UploadService;
use uploader::{AppState, create_app};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the upload server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory uploaded files are written to (overrides STORAGE_DIR)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Serve plain HTTP instead of HTTPS
    #[arg(long)]
    no_tls: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uploader=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if args.no_tls {
        config.tls.enabled = false;
    }

    info!("🚀 Starting file upload server...");
    info!(
        "🛡️  Max Size={}, TLS={}",
        config.max_file_size_label(),
        config.tls.enabled
    );

    let storage_service = storage::setup_storage(&config).await?;

    // Refuse to start without credentials rather than fall back to HTTP
    let tls_config = if config.tls.enabled {
        match tls::load_rustls_config(&config.tls).await {
            Ok(tls_config) => Some(tls_config),
            Err(e) => {
                error!("❌ {}", e);
                for line in tls::instructions(&config.tls) {
                    info!("{}", line);
                }
                std::process::exit(1);
            }
        }
    } else {
        warn!("⚠️  TLS disabled, serving plain HTTP");
        None
    };

    let upload_service = Arc::new(UploadService::new(storage_service.clone(), &config));
    let state = AppState {
        config: config.clone(),
        upload_service,
    };
    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let scheme = if tls_config.is_some() { "https" } else { "http" };

    info!(
        "✅ File upload server running at {}://localhost:{}",
        scheme, config.port
    );
    info!("📤 Upload files to: {}://localhost:{}/upload", scheme, config.port);
    info!("📂 Files will be saved to: {}", storage_service.root().display());

    match tls_config {
        Some(tls_config) => {
            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}

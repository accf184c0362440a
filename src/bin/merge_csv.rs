use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uploader::config::ServerConfig;
use uploader::services::merge::{CsvMergeService, MergeOutcome};

/// Merge every CSV in the uploads directory into a single file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to scan (overrides STORAGE_DIR)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Output file name inside the directory (overrides MERGE_OUTPUT)
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merge_csv=info,uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let dir = args.dir.unwrap_or(config.storage_dir);
    let output = args.output.unwrap_or(config.merge_output);

    let merger = CsvMergeService::new(dir, output);
    match merger.merge_all().await {
        Ok(MergeOutcome::Merged { files, rows, output }) => {
            info!(
                "✅ Merged {} rows from {} files into {}",
                rows,
                files,
                output.display()
            );
        }
        Ok(MergeOutcome::NoInputs) | Ok(MergeOutcome::NoData) => {
            info!("Nothing to merge, no output written.");
        }
        Err(e) => {
            error!("❌ Error merging CSV files: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

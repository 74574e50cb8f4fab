use anyhow::Result;
use clap::Parser;
use galen_fetch::{download_data, FetchConfig, HttpTransport, DEFAULT_BASE_URL};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "galen-fetch")]
#[command(about = "Download the CORD-19 metadata and document archives if they are missing")]
struct Cli {
    /// Paper directory to download into
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Base URL of the CORD-19 release
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: Url,
    /// Keep the .tar.gz archives after extracting them
    #[arg(long, default_value_t = false)]
    keep_archives: bool,
    /// Connection timeout in seconds
    #[arg(long, default_value_t = 30)]
    connect_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let config = FetchConfig {
        base_url: cli.base_url,
        keep_archives: cli.keep_archives,
        connect_timeout_secs: cli.connect_timeout_secs,
        ..FetchConfig::default()
    };
    let transport = HttpTransport::new(&config)?;
    let report = download_data(&cli.dir, &config, &transport).await?;
    tracing::info!(
        metadata = ?report.metadata,
        bulk_skipped = report.bulk_skipped,
        downloaded = report.downloaded.len(),
        failed = report.failed.len(),
        "acquisition finished"
    );
    Ok(())
}

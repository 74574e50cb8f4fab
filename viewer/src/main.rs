use anyhow::Result;
use axum::Router;
use clap::Parser;
use galen_viewer::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "galen-viewer")]
#[command(about = "Explore a prepared CORD-19 paper directory in the browser")]
struct Args {
    /// Paper directory prepared by galen-dataprep
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// JSON file of extra numeric columns to color by, keyed by paper id
    #[arg(long)]
    scores: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let app: Router = build_app(args.dir.clone(), args.scores.clone())?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, dir = %args.dir.display(), "viewer listening, open http://{addr}/");
    axum::serve(listener, app).await?;
    Ok(())
}

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use galen_core::projection::ProjectionConfig;
use galen_core::tfidf::TfidfConfig;
use galen_core::TEST_DOC_LIMIT;
use galen_dataprep::{make_coords, make_index, CoordsOptions};
use galen_fetch::{download_data, FetchConfig, HttpTransport};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Only process the first 2000 documents
    Test,
}

#[derive(Parser)]
#[command(name = "galen-dataprep")]
#[command(about = "Download CORD-19, lay the papers out in 2D and build a searchable index", long_about = None)]
struct Cli {
    /// Paper directory holding the downloaded data and derived artifacts
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Drop terms that appear in fewer documents than this
    #[arg(long, default_value_t = 20)]
    min_df: usize,
    /// Weight term counts as 1 + ln(tf)
    #[arg(long, default_value_t = false)]
    sublinear_tf: bool,
    /// Use ln(n / df) + 1 instead of the smoothed idf
    #[arg(long, default_value_t = false)]
    no_smooth_idf: bool,
    /// t-SNE perplexity
    #[arg(long, default_value_t = 30.0)]
    perplexity: f32,
    /// t-SNE iterations
    #[arg(long, default_value_t = 1000)]
    epochs: usize,
    /// Use the data already in the directory without checking for downloads
    #[arg(long, default_value_t = false)]
    skip_download: bool,
    /// Abort when any document archive failed to download
    #[arg(long, default_value_t = false)]
    strict_download: bool,
    #[arg(value_enum, ignore_case = true)]
    mode: Option<Mode>,
}

fn tfidf_config(cli: &Cli) -> TfidfConfig {
    TfidfConfig { min_df: cli.min_df, smooth_idf: !cli.no_smooth_idf, sublinear_tf: cli.sublinear_tf }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let num_docs = cli.mode.map(|Mode::Test| TEST_DOC_LIMIT);
    tracing::info!(dir = %cli.dir.display(), ?num_docs, "initializing data");

    if !cli.skip_download {
        let config = FetchConfig::default();
        let transport = HttpTransport::new(&config)?;
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let report = rt.block_on(download_data(&cli.dir, &config, &transport))?;
        if cli.strict_download && !report.is_complete() {
            let failed: Vec<_> = report.failed.iter().map(|(s, _)| s.as_str()).collect();
            bail!("download incomplete, failed subsets: {}", failed.join(", "));
        }
    }

    let options = CoordsOptions {
        num_docs,
        write_table: true,
        tfidf: tfidf_config(&cli),
        projection: ProjectionConfig { perplexity: cli.perplexity, epochs: cli.epochs, ..ProjectionConfig::default() },
    };
    let points = make_coords(&cli.dir, &options)?;
    tracing::info!(points = points.len(), "made the coordinates to visualize the data");

    let indexed = make_index(&cli.dir, num_docs)?;
    tracing::info!(documents = indexed, "built a searchable index from the documents");

    println!("Done. Run \"galen-viewer --dir {}\" and open the printed address to explore the data.", cli.dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighting_flags_reach_the_vectorizer() {
        let cli = Cli::try_parse_from(["galen-dataprep", "--min-df", "3", "--sublinear-tf", "--no-smooth-idf", "test"]).unwrap();
        let cfg = tfidf_config(&cli);
        assert_eq!(cfg.min_df, 3);
        assert!(cfg.sublinear_tf);
        assert!(!cfg.smooth_idf);
        assert!(matches!(cli.mode, Some(Mode::Test)));

        let defaults = tfidf_config(&Cli::try_parse_from(["galen-dataprep"]).unwrap());
        assert!(defaults.smooth_idf);
        assert!(!defaults.sublinear_tf);
        assert_eq!(defaults.min_df, 20);
    }
}

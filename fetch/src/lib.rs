//! Acquisition of the CORD-19 metadata table and bulk document archives.
//!
//! Every step is skipped when its output already exists, so running the
//! acquisition twice in the same directory performs no network requests the
//! second time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use galen_core::persist::PaperPaths;
use reqwest::Client;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://ai2-semanticscholar-cord-19.s3-us-west-2.amazonaws.com/latest/";

/// Archives published next to the metadata table, one per license subset.
pub const SUBSETS: &[&str] = &["comm_use_subset", "noncomm_use_subset", "custom_license", "biorxiv_medrxiv"];

/// When this subset directory exists the bulk download is considered done.
pub const SENTINEL_SUBSET: &str = "comm_use_subset";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: Url,
    pub subsets: Vec<String>,
    pub keep_archives: bool,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default url"),
            subsets: SUBSETS.iter().map(|s| s.to_string()).collect(),
            keep_archives: false,
            connect_timeout_secs: 30,
            user_agent: concat!("galen-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn metadata_url(&self) -> Result<Url> {
        Ok(self.base_url.join("metadata.csv")?)
    }

    pub fn archive_url(&self, subset: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("{subset}.tar.gz"))?)
    }
}

/// Moves the bytes at a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let mut resp = self.client.get(url.clone()).send().await?.error_for_status()?;
        // Stream into a side file so an interrupted download never looks complete.
        let part = PathBuf::from(format!("{}.part", dest.display()));
        let mut file = tokio::fs::File::create(&part).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part, dest).await?;
        tracing::debug!(%url, bytes = written, "downloaded");
        Ok(written)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStatus {
    AlreadyPresent,
    Downloaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub metadata: MetadataStatus,
    /// True when the bulk archives were already present.
    pub bulk_skipped: bool,
    pub downloaded: Vec<String>,
    /// Subsets that could not be fetched, with the error message.
    pub failed: Vec<(String, String)>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ensure `metadata.csv` and the document archives exist under `dir`.
///
/// A metadata download failure is returned as an error. A failed archive is
/// logged and recorded in the report; the remaining subsets are still
/// attempted.
pub async fn download_data<T>(dir: &Path, config: &FetchConfig, transport: &T) -> Result<FetchReport>
where
    T: Transport + ?Sized,
{
    let paths = PaperPaths::new(dir);
    tokio::fs::create_dir_all(dir).await?;

    let metadata_csv = paths.metadata_csv();
    let metadata = if metadata_csv.exists() {
        tracing::info!("metadata already downloaded");
        MetadataStatus::AlreadyPresent
    } else {
        let url = config.metadata_url()?;
        tracing::info!(%url, "downloading the metadata file");
        transport
            .download(&url, &metadata_csv)
            .await
            .with_context(|| format!("downloading {url}"))?;
        MetadataStatus::Downloaded
    };

    let mut report = FetchReport { metadata, bulk_skipped: false, downloaded: Vec::new(), failed: Vec::new() };
    if dir.join(SENTINEL_SUBSET).exists() {
        tracing::info!("dataset already downloaded");
        report.bulk_skipped = true;
        return Ok(report);
    }

    tracing::info!(subsets = config.subsets.len(), "downloading the CORD-19 dataset");
    for subset in &config.subsets {
        match fetch_subset(dir, subset, config, transport).await {
            Ok(()) => report.downloaded.push(subset.clone()),
            Err(e) => {
                tracing::warn!(subset = %subset, error = %format!("{e:#}"), "could not download subset, continuing with downloaded data");
                report.failed.push((subset.clone(), format!("{e:#}")));
            }
        }
    }
    Ok(report)
}

async fn fetch_subset<T>(dir: &Path, subset: &str, config: &FetchConfig, transport: &T) -> Result<()>
where
    T: Transport + ?Sized,
{
    let url = config.archive_url(subset)?;
    let archive = dir.join(format!("{subset}.tar.gz"));
    tracing::info!(%url, "downloading archive");
    let bytes = transport.download(&url, &archive).await?;

    let (src, dest) = (archive.clone(), dir.to_path_buf());
    tokio::task::spawn_blocking(move || extract_archive(&src, &dest)).await??;
    if !config.keep_archives {
        tokio::fs::remove_file(&archive).await?;
    }
    tracing::info!(subset, bytes, "extracted archive");
    Ok(())
}

/// Unpack a `.tar.gz` archive into `dest`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let f = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let mut tarball = tar::Archive::new(flate2::read::GzDecoder::new(BufReader::new(f)));
    tarball
        .unpack(dest)
        .with_context(|| format!("extracting {}", archive.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_relative_to_the_base() {
        let config = FetchConfig::default();
        assert_eq!(
            config.metadata_url().unwrap().as_str(),
            "https://ai2-semanticscholar-cord-19.s3-us-west-2.amazonaws.com/latest/metadata.csv"
        );
        assert!(config.archive_url("custom_license").unwrap().as_str().ends_with("/latest/custom_license.tar.gz"));
    }
}

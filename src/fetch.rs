use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use axum::async_trait;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("download timed out")]
    Timeout,

    #[error("download failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("download returned status {0}")]
    Status(u16),

    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e)
        }
    }
}

/// Materializes a remote image as a local file.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_and_store(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, FetchError>;
}

/// Writes `body` to `dest_dir/filename`, creating the directory if needed.
///
/// The file is written in place, so an interrupted write leaves a truncated file behind.
pub async fn store_bytes(
    dest_dir: &Path,
    filename: &str,
    body: &[u8],
) -> Result<PathBuf, FetchError> {
    let path = dest_dir.join(filename);
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| FetchError::Write {
            path: dest_dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| FetchError::Write {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), bytes = body.len(), "image stored");
    Ok(path)
}

#[derive(Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build download http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch_and_store(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, FetchError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        let path = store_bytes(dest_dir, filename, &body).await?;
        info!(path = %path.display(), "downloaded generated image");
        Ok(path)
    }
}

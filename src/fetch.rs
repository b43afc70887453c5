use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::error::{OverlayError, OverlayResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = OverlayResult<Vec<u8>>> + Send + 'a>>;

pub trait ImageFetcher: Send + Sync {
    fn fetch_bytes<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> OverlayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| OverlayError::fetch(format!("failed to build http client: {}", err)))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch_bytes<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| OverlayError::fetch(format!("request to {} failed: {}", url, err)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(OverlayError::fetch(format!(
                    "{} responded with status {}",
                    url, status
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|err| OverlayError::fetch(format!("failed to read body: {}", err)))?;
            debug!("fetched {} bytes from {}", bytes.len(), url);
            Ok(bytes.to_vec())
        })
    }
}

pub fn is_remote(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads an image from a local path, or fetches it when `source` is an http(s) URL.
pub async fn load_image_source(
    fetcher: &dyn ImageFetcher,
    source: &str,
) -> OverlayResult<Vec<u8>> {
    if is_remote(source) {
        return fetcher.fetch_bytes(source.trim()).await;
    }
    let path = Path::new(source);
    tokio::fs::read(path)
        .await
        .map_err(|err| OverlayError::fetch(format!("failed to read {}: {}", path.display(), err)))
}

//! Document fetching.
//!
//! Manifests and product definitions may live on local disk or behind an
//! HTTP(S) URL. The [`Fetch`] trait hides the difference; [`UriFetcher`]
//! handles plain paths, `file://` URIs and `http://`/`https://` URLs.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FetchConfig;

/// Something that can turn a location string into document text.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_text(&self, location: &str) -> Result<String>;
}

/// Default fetcher for local paths and HTTP(S) URLs.
pub struct UriFetcher {
    client: reqwest::Client,
}

impl UriFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Fetch for UriFetcher {
    async fn fetch_text(&self, location: &str) -> Result<String> {
        match Location::parse(location)? {
            Location::Http(url) => self.fetch_http(&url).await,
            Location::Local(path) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// A parsed document location.
#[derive(Debug, PartialEq, Eq)]
enum Location {
    Http(String),
    Local(PathBuf),
}

impl Location {
    fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            bail!("Empty document location");
        }

        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Location::Http(location.to_string()));
        }

        if location.starts_with("file://") {
            let url = Url::parse(location)
                .with_context(|| format!("Invalid file URI: {}", location))?;
            return match url.to_file_path() {
                Ok(path) => Ok(Location::Local(path)),
                Err(()) => bail!("Not a local file URI: {}", location),
            };
        }

        if let Some((scheme, _)) = location.split_once("://") {
            bail!("Unsupported URI scheme '{}' in {}", scheme, location);
        }

        Ok(Location::Local(PathBuf::from(location)))
    }
}

/// Absolute, percent-encoded `file://` URI for a local path.
pub fn file_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    match Url::from_file_path(&absolute) {
        Ok(url) => Ok(url.to_string()),
        Err(()) => bail!("Cannot build a file URI for {}", absolute.display()),
    }
}

//! Registry file source
//!
//! Fetches the raw registry file text over HTTP. The core never cares where
//! the text came from; this is just the default way to get it.

use cnames_core::cache::REGISTRY_FILE;
use cnames_core::traits::CacheStore;
use cnames_core::{Error, Result};
use std::time::Duration;
use tracing::{info, instrument};

use crate::build_client;

/// Raw registry file on the hosting service
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/js-org/js.org/master/cnames_active.js";

/// Default timeout for fetching the registry file
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP source for the raw registry file text
#[derive(Debug, Clone)]
pub struct HttpRegistrySource {
    url: String,
    client: reqwest::Client,
}

impl HttpRegistrySource {
    /// Create a source for `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, FETCH_TIMEOUT)
    }

    /// Create a source for `url` with a custom timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: build_client(timeout)?,
        })
    }

    /// The URL the file is fetched from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the registry file text
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "Fetching {} returned {}",
                self.url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        info!("Fetched registry file ({} bytes)", text.len());
        Ok(text)
    }

    /// Fetch the registry file text, reusing a cached copy if one exists
    ///
    /// A fresh fetch is saved to the cache. A failed save is logged and the
    /// text is still returned.
    pub async fn fetch_cached(&self, store: &dyn CacheStore) -> Result<String> {
        if let Some(text) = REGISTRY_FILE.load(store).await {
            info!("Cached registry file found ({} bytes)", text.len());
            return Ok(text);
        }

        let text = self.fetch().await?;
        if let Err(e) = REGISTRY_FILE.save(store, &text).await {
            tracing::warn!("Failed to cache registry file: {}", e);
        }
        Ok(text)
    }
}

//! Spreadsheet CSV export fetcher.
//!
//! Google answers export requests with one redirect to a signed download
//! URL. Exactly one hop is followed; a second redirect is an error.

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FetchConfig};
use crate::utils::http::create_async_client;
use crate::utils::resolve_url;

/// Where roster CSV comes from.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetch the full CSV export.
    async fn fetch_csv(&self) -> Result<String>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// HTTP client for the sheet export.
pub struct SheetClient {
    client: Client,
    url: String,
}

impl SheetClient {
    /// Create a client for an export URL.
    pub fn new(url: impl Into<String>, fetch: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(fetch)?,
            url: url.into(),
        })
    }

    /// Create a client for the configured sheet.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.export_url(), &config.fetch)
    }

    async fn get(&self, url: &Url) -> Result<Response> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::fetch(url.as_str(), e))
    }
}

#[async_trait]
impl SheetSource for SheetClient {
    async fn fetch_csv(&self) -> Result<String> {
        let url = Url::parse(&self.url)?;
        let mut response = self.get(&url).await?;
        let mut final_url = url.clone();

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    AppError::fetch(url.as_str(), format!("{} without Location", response.status()))
                })?;
            let next = Url::parse(&resolve_url(&url, location))?;
            log::debug!("Following redirect to {next}");

            response = self.get(&next).await?;
            if response.status().is_redirection() {
                return Err(AppError::fetch(
                    next.as_str(),
                    format!("{} after a redirect; giving up", response.status()),
                ));
            }
            final_url = next;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(final_url.as_str(), format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::fetch(final_url.as_str(), e))?;
        log::debug!("Fetched {} byte(s) from {}", body.len(), final_url);
        Ok(body)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

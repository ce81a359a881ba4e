// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::FetchConfig;

/// Create a configured asynchronous HTTP client.
///
/// Redirects are not followed automatically; the sheet client decides how
/// many hops it allows.
pub fn create_async_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::none())
        .build()?;
    Ok(client)
}

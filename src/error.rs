// src/error.rs

//! Unified error handling for the roster sync engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Spreadsheet export could not be fetched
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Template file missing or unreadable
    #[error("Failed to read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a generated page failed
    #[error("Failed to write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Version control stage/commit/push failed
    #[error("Publish failed during {step}: {message}")]
    Publish { step: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error for the given URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a template read error.
    pub fn template(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Template {
            path: path.into(),
            source,
        }
    }

    /// Create an artifact write error.
    pub fn write(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            file: file.into(),
            source,
        }
    }

    /// Create a publish error for a named git step.
    pub fn publish(step: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Publish {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error aborts a cycle before anything touched disk.
    pub fn is_pre_apply(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Fetch { .. } | Self::Template { .. }
        )
    }
}

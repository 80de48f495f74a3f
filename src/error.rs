//! Crate-wide error type.
//!
//! Most failures in a polling run are not fatal: a dead feed or a rejected
//! webhook is logged and the run moves on. [`NewsError`] is what the
//! fallible building blocks return so callers can decide which is which.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Feed XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl NewsError {
    pub fn config(message: impl Into<String>) -> Self {
        NewsError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NewsError>;

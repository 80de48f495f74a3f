//! News source scrapers.
//!
//! Each scraper turns one kind of source into dated [`NewsItem`]s:
//!
//! | Kind | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | RSS / Atom feeds | [`rss`] | XML deserialisation | Several feeds per source, results kept per feed |
//! | News pages | [`html`] | HTML scraping | Structured news cards, generic anchor fallback |
//!
//! # Common Patterns
//!
//! Each scraper module exports:
//! - a pure `parse_*` function over an already-downloaded body
//! - a `fetch_*` function that downloads every configured URL in turn
//!
//! Scrapers use:
//! - Sequential fetching, one request at a time
//! - Graceful error handling (failed fetches are logged and yield nothing)
//! - Fuzzy date extraction from [`crate::dates`]
//!
//! [`NewsItem`]: crate::models::NewsItem

pub mod html;
pub mod rss;

use crate::error::Result;
use reqwest::Client;
use tracing::{debug, instrument};

/// GET `url` and return its body, treating non-2xx statuses as errors.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let body = resp.text().await?;
    debug!(bytes = body.len(), "Fetched body");
    Ok(body)
}

//! Webhook delivery.
//!
//! Every new item becomes one chat message POSTed as JSON to a webhook URL.
//! Delivery is best effort: a failed post is logged and reported as `false`
//! so the item stays unseen and is offered again on the next run.

use crate::models::NewsItem;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

/// Discord rejects message content longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// JSON body shape expected by the receiving chat service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStyle {
    /// `{"content": "..."}`
    #[default]
    Discord,
    /// `{"text": "..."}`
    Slack,
}

impl PayloadStyle {
    pub fn payload(&self, message: &str) -> serde_json::Value {
        match self {
            PayloadStyle::Discord => json!({ "content": message }),
            PayloadStyle::Slack => json!({ "text": message }),
        }
    }
}

/// Render an item as a chat message.
///
/// ```text
/// **Patch 1.2 Notes**
/// https://arcraiders.com/news/patch-1-2
/// Published on: 2025-10-16
/// ```
pub fn format_item(item: &NewsItem) -> String {
    let message = format!(
        "**{}**\n{}\nPublished on: {}",
        item.title.trim(),
        item.link.trim(),
        item.published
    );
    clip_chars(message, MAX_MESSAGE_CHARS)
}

fn clip_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut clipped = s[..cut].to_string();
            clipped.pop();
            clipped.push('…');
            clipped
        }
        None => s,
    }
}

/// A webhook target.
#[derive(Clone)]
pub struct Webhook {
    url: String,
    style: PayloadStyle,
}

// URLs carry the webhook secret; keep them out of logs.
impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook")
            .field("url", &"<redacted>")
            .field("style", &self.style)
            .finish()
    }
}

impl Webhook {
    pub fn new(url: impl Into<String>, style: PayloadStyle) -> Self {
        Self {
            url: url.into(),
            style,
        }
    }

    /// Post `item` to the webhook; `true` only on a 2xx response.
    #[instrument(level = "info", skip_all, fields(title = %item.title, feed = %item.feed))]
    pub async fn send(&self, client: &Client, item: &NewsItem) -> bool {
        self.send_message(client, &format_item(item)).await
    }

    /// Post a pre-rendered message.
    pub async fn send_message(&self, client: &Client, message: &str) -> bool {
        if self.url.trim().is_empty() {
            warn!("Empty webhook URL provided");
            return false;
        }

        let t0 = Instant::now();
        let resp = client
            .post(&self.url)
            .json(&self.style.payload(message))
            .send()
            .await;
        let elapsed_ms = t0.elapsed().as_millis();

        match resp {
            Ok(resp) if resp.status().is_success() => {
                debug!(status = %resp.status(), elapsed_ms, "Webhook delivered");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(
                    %status,
                    elapsed_ms,
                    body = %truncate_for_log(&body, 300),
                    "Webhook rejected message"
                );
                false
            }
            Err(e) => {
                error!(elapsed_ms, error = %e.without_url(), "Webhook request failed");
                false
            }
        }
    }
}

//! Data models shared by the scrapers, the seen-store and the notifier.
//!
//! - [`NewsItem`]: one headline found on a feed or page
//! - [`KeyShape`]: which pair of fields identifies an item in a seen-store
//! - [`SeenKey`]: the pair itself

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A headline discovered on a feed or a scraped page.
///
/// Items are only built once a publication date could be parsed, so
/// `published` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// Key of the feed or page this item came from (e.g. `thehackernews`).
    pub feed: String,
    /// Headline text, whitespace-normalised.
    pub title: String,
    /// Absolute URL of the story.
    pub link: String,
    /// Publication date.
    pub published: NaiveDate,
}

impl NewsItem {
    pub fn new(
        feed: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published: NaiveDate,
    ) -> Self {
        Self {
            feed: feed.into(),
            title: title.into(),
            link: link.into(),
            published,
        }
    }

    /// Dedupe key for this item under the given shape.
    pub fn key(&self, shape: KeyShape) -> SeenKey {
        match shape {
            KeyShape::TitleDate => SeenKey::new(&self.title, self.published.to_string()),
            KeyShape::TitleLink => SeenKey::new(&self.title, &self.link),
        }
    }
}

/// How items are identified in a seen-store.
///
/// Feeds republish the same story under tracking-laden URLs, so RSS sources
/// key on title and date. Scraped pages rewrite their dates more often than
/// their links, so they key on title and link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    TitleDate,
    TitleLink,
}

impl KeyShape {
    /// JSON field name the second half of the key is stored under.
    pub fn field(&self) -> &'static str {
        match self {
            KeyShape::TitleDate => "published",
            KeyShape::TitleLink => "link",
        }
    }
}

/// A `(title, date-or-link)` pair recorded in a seen-store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeenKey {
    pub title: String,
    pub second: String,
}

impl SeenKey {
    pub fn new(title: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            second: second.into(),
        }
    }
}

//! RSS / Atom feed scraper.
//!
//! Each `<item>` / `<entry>` is cut out of the document with `quick-xml`'s
//! reader and deserialised on its own into one loose shape that covers the
//! three dialects seen in the wild:
//!
//! | Dialect | Items live at |
//! |---------|---------------|
//! | RSS 2.0 | `rss/channel/item` |
//! | RSS 1.0 (RDF) | `rdf:RDF/item` |
//! | Atom | `feed/entry` |
//!
//! Items without a parseable publication date are dropped, since the
//! pipeline only forwards items published today.

use crate::dates::parse_feed_timestamp;
use crate::error::Result;
use crate::models::NewsItem;
use crate::scrapers::fetch_text;
use crate::utils::collapse_whitespace;
use futures::stream::{self, StreamExt};
use quick_xml::de::{Deserializer, EntityResolver};
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use tracing::{debug, error, info, instrument, warn};

/// An RSS `<item>` or Atom `<entry>`; the element names barely overlap.
///
/// The deserializer matches names without their namespace prefix, so
/// `<media:title>` lands next to `<title>` and `<atom:link>` next to
/// `<link>`. Every field is a list and the unprefixed element comes first.
#[derive(Debug, Default, Deserialize)]
struct FeedEntry {
    #[serde(rename = "title", default)]
    titles: Vec<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<LinkNode>,
    #[serde(rename = "guid", default)]
    guids: Vec<TextNode>,
    #[serde(rename = "pubDate", default)]
    pub_date: Vec<TextNode>,
    #[serde(default)]
    published: Vec<TextNode>,
    #[serde(default)]
    updated: Vec<TextNode>,
    #[serde(rename = "dc:date", alias = "date", default)]
    dc_date: Vec<TextNode>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// RSS `<link>https://…</link>` or Atom `<link rel="alternate" href="…"/>`.
#[derive(Debug, Default, Deserialize)]
struct LinkNode {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

fn first_text(nodes: &[TextNode]) -> Option<&str> {
    nodes
        .iter()
        .map(|n| n.value.trim())
        .find(|v| !v.is_empty())
}

impl FeedEntry {
    fn title(&self) -> String {
        first_text(&self.titles)
            .map(collapse_whitespace)
            .unwrap_or_default()
    }

    fn link(&self) -> String {
        if let Some(l) = self.links.iter().find(|l| !l.text.trim().is_empty()) {
            return l.text.trim().to_string();
        }
        let alternate = self
            .links
            .iter()
            .filter(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .find_map(|l| l.href.as_deref());
        let any = self.links.iter().find_map(|l| l.href.as_deref());
        if let Some(href) = alternate.or(any) {
            return href.trim().to_string();
        }
        first_text(&self.guids).unwrap_or_default().to_string()
    }

    fn timestamp(&self) -> Option<&str> {
        [&self.pub_date, &self.published, &self.updated, &self.dc_date]
            .into_iter()
            .find_map(|nodes| first_text(nodes))
    }
}

/// Resolves HTML named entities (`&nbsp;`, `&eacute;`, ...) that feeds
/// routinely use without declaring them.
struct HtmlEntities;

impl EntityResolver for HtmlEntities {
    type Error = Infallible;

    fn capture(&mut self, _doctype: BytesText) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn resolve(&self, entity: &str) -> Option<&str> {
        resolve_html5_entity(entity)
    }
}

/// Raw `<item>…</item>` / `<entry>…</entry>` slices of the document.
///
/// Fails only when the document itself is not well-formed.
fn entry_fragments(xml: &str) -> Result<Vec<&str>> {
    let mut reader = Reader::from_str(xml);
    let mut fragments = Vec::new();
    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) if matches!(e.local_name().as_ref(), b"item" | b"entry") => {
                reader.read_to_end(e.name())?;
                let end = reader.buffer_position() as usize;
                fragments.push(&xml[start..end]);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(fragments)
}

/// Parse a feed body into dated items, newest first.
///
/// Items are decoded one at a time: an item that cannot be decoded is
/// logged and skipped without affecting its siblings.
///
/// # Arguments
///
/// * `feed` - Key recorded on every produced item
/// * `xml` - Raw feed document
///
/// # Errors
///
/// Returns [`NewsError::Xml`](crate::error::NewsError::Xml) when
/// the body is not well-formed XML.
pub fn parse_feed(feed: &str, xml: &str) -> Result<Vec<NewsItem>> {
    let mut items = Vec::new();
    for fragment in entry_fragments(xml)? {
        let mut de = Deserializer::from_str_with_resolver(fragment, HtmlEntities);
        let entry = match FeedEntry::deserialize(&mut de) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%feed, error = %e, "Skipping undecodable feed entry");
                continue;
            }
        };
        let title = entry.title();
        if title.is_empty() {
            debug!(%feed, "Skipping feed entry without a title");
            continue;
        }
        let Some(published) = entry.timestamp().and_then(parse_feed_timestamp) else {
            debug!(%feed, %title, "Skipping feed entry without a usable date");
            continue;
        };
        items.push(NewsItem::new(feed, title, entry.link(), published));
    }

    items.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(items)
}

/// Fetch and parse every feed.
///
/// Every feed key is present in the result. A feed that cannot be fetched
/// or parsed is logged and maps to an empty list.
#[instrument(level = "info", skip_all, fields(feeds = feeds.len()))]
pub async fn fetch_feeds(
    client: &Client,
    feeds: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<NewsItem>> {
    let results: BTreeMap<String, Vec<NewsItem>> = stream::iter(feeds.iter())
        .then(|(name, url)| async move {
            let items = match fetch_feed(client, name, url).await {
                Ok(items) => {
                    info!(feed = %name, %url, count = items.len(), "Parsed feed");
                    items
                }
                Err(e) => {
                    error!(feed = %name, %url, error = %e, "Feed fetch failed");
                    Vec::new()
                }
            };
            (name.clone(), items)
        })
        .collect()
        .await;

    let total: usize = results.values().map(Vec::len).sum();
    info!(total, "Fetched all feeds");
    results
}

async fn fetch_feed(client: &Client, name: &str, url: &str) -> Result<Vec<NewsItem>> {
    let body = fetch_text(client, url).await?;
    parse_feed(name, &body)
}

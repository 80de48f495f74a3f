//! News page scraper.
//!
//! Game studios publish patch notes and announcements on plain web pages,
//! not feeds. The page is scraped in two passes:
//!
//! 1. **Structured cards**: anchors whose class contains
//!    `news-article-card_container`, each holding a `…_title` and a `…_date`
//!    element (the hashed CSS-module class names change between deploys,
//!    hence substring matching).
//! 2. **Generic fallback**: when no card is found, the first 50 anchors
//!    under `<main>` (or `#content`, or the whole document), with the date
//!    taken from a nested `<time>`, an element whose class mentions `date`,
//!    or any `<span>` that contains a year.
//!
//! Items are deduplicated by `(title, link)` keeping the newest date, and
//! returned newest first. Items from the same day keep their page order.

use crate::dates::parse_date;
use crate::models::NewsItem;
use crate::scrapers::fetch_text;
use crate::utils::{collapse_whitespace, element_text, resolve_link};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument};

/// Anchors considered by the generic fallback.
const MAX_FALLBACK_ANCHORS: usize = 50;

static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[class*="news-article-card_container"]"#).unwrap());
static CARD_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="news-article-card_title"]"#).unwrap());
static CARD_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="news-article-card_date"]"#).unwrap());
static MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("#content").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static DATE_CLASS: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"[class*="date"]"#).unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

/// Scrape news items out of a page.
///
/// # Arguments
///
/// * `feed` - Key recorded on every produced item
/// * `page_url` - URL the page was fetched from; relative links resolve against it
/// * `html` - Raw page body
///
/// # Returns
///
/// Dated items, unique by `(title, link)`, newest first. Anchors whose date
/// cannot be parsed are skipped.
pub fn parse_news_page(feed: &str, page_url: &str, html: &str) -> Vec<NewsItem> {
    let document = Html::parse_document(html);

    let mut cards: Vec<ElementRef<'_>> = document.select(&CARD).collect();
    let structured = !cards.is_empty();
    if !structured {
        let scope = document
            .select(&MAIN)
            .next()
            .or_else(|| document.select(&CONTENT).next())
            .unwrap_or_else(|| document.root_element());
        cards = scope.select(&ANCHOR).take(MAX_FALLBACK_ANCHORS).collect();
    }
    debug!(%feed, structured, cards = cards.len(), "Selected candidate anchors");

    let entries = cards
        .into_iter()
        .filter_map(|card| parse_card(feed, page_url, card))
        .collect::<Vec<_>>();
    let parsed = entries.len();

    // Each key keeps its first position on the page; same-day items stay in page order.
    let items: Vec<NewsItem> = entries
        .into_iter()
        .enumerate()
        .into_grouping_map_by(|(_, i)| (i.title.clone(), i.link.clone()))
        .reduce(|(first, kept), _, (_, next)| {
            if next.published > kept.published {
                (first, next)
            } else {
                (first, kept)
            }
        })
        .into_values()
        .sorted_by(|(ia, a), (ib, b)| b.published.cmp(&a.published).then(ia.cmp(ib)))
        .map(|(_, item)| item)
        .collect();

    debug!(%feed, parsed, unique = items.len(), "Scraped news page");
    items
}

fn parse_card(feed: &str, page_url: &str, card: ElementRef<'_>) -> Option<NewsItem> {
    let href = card
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty());

    let title_el = card.select(&CARD_TITLE).next();
    let date_el = card.select(&CARD_DATE).next();
    if let (Some(title_el), Some(date_el), Some(href)) = (title_el, date_el, href) {
        let title = element_text(title_el);
        let link = resolve_link(page_url, href)?;
        let Some(published) = parse_date(&element_text(date_el)) else {
            debug!(%title, "Card date did not parse");
            return None;
        };
        return (!title.is_empty()).then(|| NewsItem::new(feed, title, link, published));
    }

    let href = href?;
    let mut title = element_text(card);
    if title.is_empty() {
        title = card
            .value()
            .attr("title")
            .map(collapse_whitespace)
            .unwrap_or_default();
    }
    if title.is_empty() {
        return None;
    }
    let link = resolve_link(page_url, href)?;
    let published = nearby_date_text(card).as_deref().and_then(parse_date)?;
    Some(NewsItem::new(feed, title, link, published))
}

/// Best guess at the date text nested inside a generic anchor.
fn nearby_date_text(card: ElementRef<'_>) -> Option<String> {
    if let Some(time) = card.select(&TIME).next() {
        let text = time
            .value()
            .attr("datetime")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| element_text(time));
        return Some(text);
    }
    if let Some(el) = card.select(&DATE_CLASS).next() {
        return Some(element_text(el));
    }
    card.select(&SPAN)
        .map(element_text)
        .find(|text| YEAR.is_match(text))
}

/// Fetch and scrape every page, one after another.
///
/// Pages that fail to download are logged and contribute nothing.
#[instrument(level = "info", skip_all, fields(pages = pages.len()))]
pub async fn fetch_pages(client: &Client, pages: &BTreeMap<String, String>) -> Vec<NewsItem> {
    let items: Vec<NewsItem> = stream::iter(pages.iter())
        .then(|(name, url)| async move {
            match fetch_text(client, url).await {
                Ok(body) => {
                    let items = parse_news_page(name, url, &body);
                    info!(page = %name, %url, count = items.len(), "Scraped news page");
                    items
                }
                Err(e) => {
                    error!(page = %name, %url, error = %e, "News page fetch failed");
                    Vec::new()
                }
            }
        })
        .concat()
        .await;

    info!(count = items.len(), "Fetched all news pages");
    items
}

//! One polling pass over a configured source.
//!
//! ```text
//! fetch (rss | html) ─▶ filter_new(seen-store, today) ─▶ webhook ─▶ mark seen ─▶ save
//! ```
//!
//! Only items the webhook accepted are marked seen, so anything that failed
//! to post is offered again on the next run. In dry-run mode nothing is
//! posted and the store is left untouched.

use crate::config::{SourceConfig, SourceKind};
use crate::error::Result;
use crate::models::NewsItem;
use crate::notify::Webhook;
use crate::scrapers::{html, rss};
use crate::seen::SeenStore;
use chrono::NaiveDate;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Everything a run needs besides the source itself.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Client for feed and page downloads.
    pub fetch_client: Client,
    /// Client for webhook posts.
    pub webhook_client: Client,
    /// Directory seen-store paths are relative to.
    pub state_dir: PathBuf,
    /// Only items published on this day are forwarded.
    pub today: NaiveDate,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(
        state_dir: impl Into<PathBuf>,
        today: NaiveDate,
        fetch_timeout: Duration,
        webhook_timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        Ok(Self {
            fetch_client: build_client(fetch_timeout)?,
            webhook_client: build_client(webhook_timeout)?,
            state_dir: state_dir.into(),
            today,
            dry_run,
        })
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Counters for one source's run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub source: String,
    /// Dated items parsed from all of the source's URLs.
    pub fetched: usize,
    /// Items from today not yet in the seen-store.
    pub fresh: usize,
    pub delivered: usize,
    /// Fresh items that were not delivered (webhook error or no webhook).
    pub failed: usize,
}

/// Fetch, dedupe and announce one source.
///
/// Network and parse failures only shrink the item list. The returned error
/// is reserved for failing to persist the seen-store.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn run_source(
    ctx: &RunContext,
    source: &SourceConfig,
    webhook: Option<&Webhook>,
) -> Result<RunReport> {
    let items = fetch_source(ctx, source).await;
    let mut report = RunReport {
        source: source.name.clone(),
        fetched: items.len(),
        ..RunReport::default()
    };

    let mut store = SeenStore::load(source.seen_path(&ctx.state_dir), source.key_shape()).await;
    let fresh = store.filter_new(&items, ctx.today);
    report.fresh = fresh.len();
    info!(
        fetched = report.fetched,
        fresh = report.fresh,
        seen = store.len(),
        today = %ctx.today,
        "Filtered new items"
    );

    if fresh.is_empty() {
        return Ok(report);
    }

    if ctx.dry_run {
        for item in &fresh {
            info!(feed = %item.feed, title = %item.title, link = %item.link, "Dry run: would send");
        }
        return Ok(report);
    }

    let Some(webhook) = webhook else {
        warn!(
            env = %source.webhook_env,
            unsent = fresh.len(),
            "No webhook URL configured; leaving new items unsent"
        );
        report.failed = fresh.len();
        return Ok(report);
    };

    let mut delivered = Vec::with_capacity(fresh.len());
    for item in &fresh {
        if webhook.send(&ctx.webhook_client, item).await {
            delivered.push(item);
        }
    }
    report.delivered = delivered.len();
    report.failed = fresh.len() - delivered.len();
    store.mark_seen(delivered);

    if store.is_dirty() {
        store.save().await?;
    }

    info!(
        delivered = report.delivered,
        failed = report.failed,
        "Source run complete"
    );
    Ok(report)
}

async fn fetch_source(ctx: &RunContext, source: &SourceConfig) -> Vec<NewsItem> {
    let items: Vec<NewsItem> = match source.kind {
        SourceKind::Rss => rss::fetch_feeds(&ctx.fetch_client, &source.urls)
            .await
            .into_values()
            .flatten()
            .collect(),
        SourceKind::Html => html::fetch_pages(&ctx.fetch_client, &source.urls).await,
    };
    debug!(count = items.len(), kind = ?source.kind, "Fetched source items");
    items
}

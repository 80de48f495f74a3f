//! # news_relay
//!
//! Polls news sources, skips what was already announced, and posts the rest
//! to chat webhooks. Meant to be run periodically by cron or a systemd timer;
//! each invocation is one pass.
//!
//! ## Features
//!
//! - RSS 2.0, RSS 1.0 and Atom feeds (security news by default)
//! - Scraped HTML news pages with selector fallbacks (game news by default)
//! - Per-source seen-stores in JSON or line-delimited text
//! - Discord (`content`) or Slack (`text`) webhook payloads
//!
//! ## Usage
//!
//! ```sh
//! HACKERNEWS=https://discord.com/api/webhooks/... news_relay -s ./state
//! ```
//!
//! ## Architecture
//!
//! For every configured source, in order:
//! 1. **Fetching**: Download each feed or page, one request at a time
//! 2. **Parsing**: Turn bodies into dated items; failures yield no items
//! 3. **Filtering**: Keep items published today that the seen-store lacks
//! 4. **Notifying**: Post each item; record only the ones that were accepted

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod error;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod seen;
mod utils;

use cli::Cli;
use config::Config;
use pipeline::{RunContext, RunReport, run_source};
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv_path = dotenv::dotenv().ok();
    let args = Cli::parse();

    // --- Tracing init ---
    let default_filter = if args.verbose {
        "news_relay=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_relay starting up");
    if let Some(path) = &dotenv_path {
        debug!(path = %path.display(), "Loaded .env");
    }
    debug!(?args.config, ?args.state_dir, ?args.only, "Parsed CLI arguments");

    // Seen-stores are written after webhooks fire; fail before that instead.
    if let Err(e) = ensure_writable_dir(&args.state_dir).await {
        error!(
            path = %args.state_dir.display(),
            error = %e,
            "State directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let config = Config::load(args.config.as_deref()).await?;
    let sources = config.select(&args.only)?;
    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    info!(sources = sources.len(), %today, dry_run = args.dry_run, "Starting run");

    let ctx = RunContext::new(
        &args.state_dir,
        today,
        args.fetch_timeout(),
        args.webhook_timeout(),
        args.dry_run,
    )?;

    let mut reports: Vec<RunReport> = Vec::with_capacity(sources.len());
    for source in sources {
        let webhook = source.webhook();
        if webhook.is_none() && !args.dry_run {
            warn!(source = %source.name, env = %source.webhook_env, "Webhook variable is unset");
        }
        match run_source(&ctx, source, webhook.as_ref()).await {
            Ok(report) => reports.push(report),
            Err(e) => error!(source = %source.name, error = %e, "Failed to record seen items"),
        }
    }

    let delivered: usize = reports.iter().map(|r| r.delivered).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let fresh: usize = reports.iter().map(|r| r.fresh).sum();
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        fresh,
        delivered,
        failed,
        "Execution complete"
    );

    Ok(())
}

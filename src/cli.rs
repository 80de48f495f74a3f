//! Command-line interface definitions for news_relay.
//!
//! Options can be provided via command-line flags, and the paths also via
//! environment variables (or a `.env` file), which suits cron and systemd
//! timers.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for a single polling run.
///
/// # Examples
///
/// ```sh
/// # Poll the built-in sources, state files in the current directory
/// news_relay
///
/// # Custom source list and state directory, only the gaming page
/// news_relay -c news_sources.yaml -s /var/lib/news_relay --only arcraiders
///
/// # See what would be announced for a given day without posting anything
/// news_relay --date 2025-10-16 --dry-run -v
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML source list (built-in sources when omitted)
    #[arg(short, long, env = "NEWS_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the seen-store files
    #[arg(short, long, env = "NEWS_RELAY_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Only run the named source (repeatable)
    #[arg(long = "only", value_name = "SOURCE")]
    pub only: Vec<String>,

    /// Treat this day (YYYY-MM-DD) as today instead of the local date
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Log what would be sent without posting or recording anything
    #[arg(long)]
    pub dry_run: bool,

    /// Timeout in seconds for feed and page downloads
    #[arg(long, default_value_t = 15)]
    pub fetch_timeout: u64,

    /// Timeout in seconds for webhook posts
    #[arg(long, default_value_t = 10)]
    pub webhook_timeout: u64,

    /// Debug-level logging for this crate
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["news_relay"]).unwrap();
        assert_eq!(cli.state_dir, PathBuf::from("."));
        assert!(cli.only.is_empty());
        assert!(cli.date.is_none());
        assert!(!cli.dry_run);
        assert_eq!(cli.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(cli.webhook_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "news_relay",
            "-c",
            "/etc/news_relay.yaml",
            "-s",
            "/var/lib/news_relay",
            "-v",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/news_relay.yaml")));
        assert_eq!(cli.state_dir, PathBuf::from("/var/lib/news_relay"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_only_and_date() {
        let cli = Cli::parse_from([
            "news_relay",
            "--only",
            "hacking",
            "--only",
            "arcraiders",
            "--date",
            "2025-10-16",
            "--dry-run",
        ]);

        assert_eq!(cli.only, vec!["hacking", "arcraiders"]);
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2025, 10, 16));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["news_relay", "--date", "16/10/2025"]).is_err());
    }
}

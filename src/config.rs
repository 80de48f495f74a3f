//! Source configuration.
//!
//! Sources are listed in a YAML file (see `news_sources.example.yaml`) or,
//! when no file is given, taken from [`Config::builtin`]. Webhook URLs are
//! secrets and never live in the file: each source names the environment
//! variable that holds its URL (`HACKERNEWS`, `ARCRAIDERNEWS`, ...), which
//! may also come from a `.env` file.

use crate::error::{NewsError, Result};
use crate::models::KeyShape;
use crate::notify::{PayloadStyle, Webhook};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

/// How a source's URLs are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS 2.0, RSS 1.0 or Atom feeds.
    Rss,
    /// HTML news pages, scraped.
    Html,
}

impl SourceKind {
    pub fn default_key(&self) -> KeyShape {
        match self {
            SourceKind::Rss => KeyShape::TitleDate,
            SourceKind::Html => KeyShape::TitleLink,
        }
    }
}

/// One group of feeds or pages sharing a webhook and a seen-store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// Feed/page key → URL. The key is recorded on every item.
    pub urls: BTreeMap<String, String>,
    /// Environment variable holding the webhook URL.
    pub webhook_env: String,
    #[serde(default)]
    pub key: Option<KeyShape>,
    #[serde(default)]
    pub payload: PayloadStyle,
    /// Seen-store file, relative to the state directory.
    #[serde(default)]
    pub seen_file: Option<String>,
}

impl SourceConfig {
    pub fn key_shape(&self) -> KeyShape {
        self.key.unwrap_or_else(|| self.kind.default_key())
    }

    pub fn seen_path(&self, state_dir: &Path) -> PathBuf {
        match &self.seen_file {
            Some(file) => state_dir.join(file),
            None => state_dir.join(format!("{}_seen.json", self.name)),
        }
    }

    /// Webhook from the process environment, if the variable is set and non-empty.
    pub fn webhook(&self) -> Option<Webhook> {
        self.webhook_with(|name| std::env::var(name).ok())
    }

    /// Webhook resolved through `lookup` instead of the process environment.
    pub fn webhook_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<Webhook> {
        lookup(&self.webhook_env)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|url| Webhook::new(url, self.payload))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// The sources polled when no config file is given.
    pub fn builtin() -> Self {
        let hacking = SourceConfig {
            name: "hacking".to_string(),
            kind: SourceKind::Rss,
            urls: BTreeMap::from([
                (
                    "bleepingcomputer".to_string(),
                    "https://www.bleepingcomputer.com/feed/".to_string(),
                ),
                (
                    "thehackernews".to_string(),
                    "https://feeds.feedburner.com/TheHackersNews".to_string(),
                ),
            ]),
            webhook_env: "HACKERNEWS".to_string(),
            key: None,
            payload: PayloadStyle::Discord,
            seen_file: Some("hacking_seen.json".to_string()),
        };
        let arcraiders = SourceConfig {
            name: "arcraiders".to_string(),
            kind: SourceKind::Html,
            urls: BTreeMap::from([(
                "arcraiders".to_string(),
                "https://arcraiders.com/news".to_string(),
            )]),
            webhook_env: "ARCRAIDERNEWS".to_string(),
            key: None,
            payload: PayloadStyle::Discord,
            seen_file: Some("gamenews_seen.json".to_string()),
        };
        Config {
            sources: vec![hacking, arcraiders],
        }
    }

    /// Parse and validate a YAML source list.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the YAML file at `path`, or the built-in sources when `None`.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file given; using built-in sources");
            return Ok(Self::builtin());
        };
        let raw = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml_str(&raw)?;
        info!(sources = config.sources.len(), "Loaded source config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(NewsError::config("no sources configured"));
        }
        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(NewsError::config("source with an empty name"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(NewsError::config(format!(
                    "duplicate source name `{}`",
                    source.name
                )));
            }
            if source.urls.is_empty() {
                return Err(NewsError::config(format!(
                    "source `{}` has no urls",
                    source.name
                )));
            }
            if source.webhook_env.trim().is_empty() {
                return Err(NewsError::config(format!(
                    "source `{}` has an empty webhook_env",
                    source.name
                )));
            }
            for (key, url) in &source.urls {
                Url::parse(url).map_err(|e| {
                    NewsError::config(format!(
                        "source `{}` url `{key}` is invalid: {e}",
                        source.name
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Sources to run: all of them, or only those named in `only`.
    pub fn select(&self, only: &[String]) -> Result<Vec<&SourceConfig>> {
        if only.is_empty() {
            return Ok(self.sources.iter().collect());
        }
        if let Some(unknown) = only
            .iter()
            .find(|n| !self.sources.iter().any(|s| &s.name == *n))
        {
            return Err(NewsError::config(format!("unknown source `{unknown}`")));
        }
        Ok(self
            .sources
            .iter()
            .filter(|s| only.contains(&s.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
sources:
  - name: hacking
    kind: rss
    webhook_env: HACKERNEWS
    urls:
      thehackernews: https://feeds.feedburner.com/TheHackersNews
  - name: devnews
    kind: rss
    webhook_env: DEVNEWS
    key: title_link
    payload: slack
    seen_file: dev/seen.txt
    urls:
      rustblog: https://blog.rust-lang.org/feed.xml
"#;

    #[test]
    fn test_parse_yaml_defaults() {
        let config = Config::from_yaml_str(YAML).unwrap();
        let hacking = &config.sources[0];
        assert_eq!(hacking.kind, SourceKind::Rss);
        assert_eq!(hacking.key_shape(), KeyShape::TitleDate);
        assert_eq!(hacking.payload, PayloadStyle::Discord);
        assert_eq!(
            hacking.seen_path(Path::new("/var/lib/news")),
            PathBuf::from("/var/lib/news/hacking_seen.json")
        );
    }

    #[test]
    fn test_parse_yaml_overrides() {
        let config = Config::from_yaml_str(YAML).unwrap();
        let dev = &config.sources[1];
        assert_eq!(dev.key_shape(), KeyShape::TitleLink);
        assert_eq!(dev.payload, PayloadStyle::Slack);
        assert_eq!(
            dev.seen_path(Path::new("state")),
            PathBuf::from("state/dev/seen.txt")
        );
    }

    #[test]
    fn test_example_file_parses() {
        let config = Config::from_yaml_str(include_str!("../news_sources.example.yaml")).unwrap();
        assert!(config.sources.iter().any(|s| s.kind == SourceKind::Html));
    }

    #[test]
    fn test_builtin_is_valid() {
        let config = Config::builtin();
        config.validate().unwrap();
        let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["hacking", "arcraiders"]);
        assert_eq!(config.sources[1].key_shape(), KeyShape::TitleLink);
        assert_eq!(
            config.sources[1].seen_path(Path::new(".")),
            PathBuf::from("./gamenews_seen.json")
        );
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let yaml = r#"
sources:
  - {name: a, kind: rss, webhook_env: A, urls: {x: "https://x"}}
  - {name: a, kind: html, webhook_env: B, urls: {y: "https://y"}}
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn test_rejects_bad_url() {
        let yaml = r#"
sources:
  - {name: a, kind: rss, webhook_env: A, urls: {x: "not a url"}}
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, NewsError::Config { .. }));
    }

    #[test]
    fn test_rejects_empty_urls_and_unknown_kind() {
        let empty = r#"
sources:
  - {name: a, kind: rss, webhook_env: A, urls: {}}
"#;
        assert!(Config::from_yaml_str(empty).is_err());

        let unknown = r#"
sources:
  - {name: a, kind: atom, webhook_env: A, urls: {x: "https://x"}}
"#;
        assert!(matches!(
            Config::from_yaml_str(unknown),
            Err(NewsError::Yaml(_))
        ));
    }

    #[test]
    fn test_select() {
        let config = Config::builtin();
        assert_eq!(config.select(&[]).unwrap().len(), 2);

        let only = config.select(&["arcraiders".to_string()]).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "arcraiders");

        assert!(config.select(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_webhook_lookup() {
        let config = Config::builtin();
        let hacking = &config.sources[0];

        let hook = hacking.webhook_with(|name| {
            (name == "HACKERNEWS").then(|| "https://discord.test/hook".to_string())
        });
        assert!(hook.is_some());

        assert!(hacking.webhook_with(|_| None).is_none());
        assert!(hacking.webhook_with(|_| Some("   ".to_string())).is_none());
    }

    #[tokio::test]
    async fn test_load_without_path_is_builtin() {
        let config = Config::load(None).await.unwrap();
        assert_eq!(config.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sources.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = Config::load(Some(path.as_path())).await.unwrap();
        assert_eq!(config.sources[1].name, "devnews");
    }
}

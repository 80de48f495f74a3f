//! Seen-store: the on-disk record of items already announced.
//!
//! One store per source. The file format follows the extension:
//!
//! ```text
//! hacking_seen.json   [{"title": "...", "published": "2025-10-16"}, ...]
//! gamenews_seen.json  [{"title": "...", "link": "https://..."}, ...]
//! news.txt            title<TAB>2025-10-16   (one key per line)
//! ```
//!
//! Loading is best effort: a missing file is an empty store, and a corrupt
//! one is logged and treated as empty. Writes are whole-file and unlocked.

use crate::error::Result;
use crate::models::{KeyShape, NewsItem, SeenKey};
use chrono::NaiveDate;
use itertools::Itertools;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreFormat {
    Json,
    Lines,
}

impl StoreFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => StoreFormat::Json,
            _ => StoreFormat::Lines,
        }
    }
}

#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    shape: KeyShape,
    format: StoreFormat,
    keys: BTreeSet<SeenKey>,
    dirty: bool,
}

impl SeenStore {
    /// Empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>, shape: KeyShape) -> Self {
        let path = path.into();
        let format = StoreFormat::for_path(&path);
        Self {
            path,
            shape,
            format,
            keys: BTreeSet::new(),
            dirty: false,
        }
    }

    /// Load the store at `path`, falling back to an empty store.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, shape: KeyShape) -> Self {
        let mut store = Self::new(path.as_ref(), shape);
        let raw = match fs::read_to_string(&store.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No seen-store yet; starting empty");
                return store;
            }
            Err(e) => {
                error!(error = %e, "Failed to read seen-store; starting empty");
                return store;
            }
        };

        let parsed = match store.format {
            StoreFormat::Json => parse_json(&raw, shape),
            StoreFormat::Lines => Ok(parse_lines(&raw)),
        };
        match parsed {
            Ok(keys) => store.keys = keys,
            Err(e) => error!(error = %e, "Seen-store is corrupt; starting empty"),
        }
        info!(count = store.keys.len(), "Loaded seen-store");
        store
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether keys were added since the store was loaded or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, key: &SeenKey) -> bool {
        self.keys.contains(key)
    }

    /// Record `key`; returns `false` if it was already present.
    pub fn insert(&mut self, key: SeenKey) -> bool {
        let added = self.keys.insert(key);
        self.dirty |= added;
        added
    }

    /// Record every item's key; returns how many were new.
    pub fn mark_seen<'a>(&mut self, items: impl IntoIterator<Item = &'a NewsItem>) -> usize {
        let shape = self.shape;
        items
            .into_iter()
            .filter(|item| self.insert(item.key(shape)))
            .count()
    }

    /// Items published on `today` whose key is not yet recorded.
    ///
    /// Repeats within `items` (same key) collapse to the first occurrence.
    pub fn filter_new(&self, items: &[NewsItem], today: NaiveDate) -> Vec<NewsItem> {
        items
            .iter()
            .filter(|item| item.published == today)
            .unique_by(|item| item.key(self.shape))
            .filter(|item| !self.contains(&item.key(self.shape)))
            .cloned()
            .collect()
    }

    /// Write the whole store, sorted, creating parent directories as needed.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = self.keys.len()))]
    pub async fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let body = match self.format {
            StoreFormat::Json => self.to_json()?,
            StoreFormat::Lines => self.to_lines(),
        };
        fs::write(&self.path, body).await?;
        self.dirty = false;
        info!("Saved seen-store");
        Ok(())
    }

    fn to_json(&self) -> Result<String> {
        let field = self.shape.field();
        let records: Vec<Value> = self
            .keys
            .iter()
            .map(|k| {
                let mut obj = Map::new();
                obj.insert("title".to_string(), Value::String(k.title.clone()));
                obj.insert(field.to_string(), Value::String(k.second.clone()));
                Value::Object(obj)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    fn to_lines(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}\t{}\n", flatten_line(&k.title), flatten_line(&k.second)))
            .collect()
    }
}

fn parse_json(raw: &str, shape: KeyShape) -> Result<BTreeSet<SeenKey>> {
    let records: Vec<Value> = serde_json::from_str(raw)?;
    let field = shape.field();
    let keys = records
        .iter()
        .filter_map(|r| {
            let title = r.get("title")?.as_str()?;
            let second = r.get(field)?.as_str()?;
            Some(SeenKey::new(title, second))
        })
        .collect::<BTreeSet<_>>();
    if keys.len() < records.len() {
        debug!(
            skipped = records.len() - keys.len(),
            field, "Ignored seen records missing fields"
        );
    }
    Ok(keys)
}

fn parse_lines(raw: &str) -> BTreeSet<SeenKey> {
    raw.lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(title, second)| SeenKey::new(title, second))
        .collect()
}

fn flatten_line(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn item(title: &str, link: &str, published: NaiveDate) -> NewsItem {
        NewsItem::new("feed", title, link, published)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SeenStore::load(tmp.path().join("nope.json"), KeyShape::TitleLink).await;
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("seen.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SeenStore::load(&path, KeyShape::TitleLink).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_json_roundtrip_title_date() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hacking_seen.json");

        let mut store = SeenStore::new(&path, KeyShape::TitleDate);
        store.mark_seen(&[item("Zero-day in Ünïcode parser", "https://a", d(2025, 10, 16))]);
        store.save().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"published\": \"2025-10-16\""));
        assert!(raw.contains("Ünïcode"));
        assert!(!raw.contains("\"link\""));

        let reloaded = SeenStore::load(&path, KeyShape::TitleDate).await;
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(&SeenKey::new("Zero-day in Ünïcode parser", "2025-10-16")));
    }

    #[tokio::test]
    async fn test_json_reads_existing_title_link_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gamenews_seen.json");
        std::fs::write(
            &path,
            r#"[
  {"title": "Patch 1.2 Notes", "link": "https://arcraiders.com/news/patch-1-2"},
  {"title": "Broken record"},
  {"title": 42, "link": "https://x"}
]"#,
        )
        .unwrap();

        let store = SeenStore::load(&path, KeyShape::TitleLink).await;
        assert_eq!(store.len(), 1);
        assert!(store.contains(&SeenKey::new(
            "Patch 1.2 Notes",
            "https://arcraiders.com/news/patch-1-2"
        )));
    }

    #[tokio::test]
    async fn test_json_output_is_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("seen.json");
        let mut store = SeenStore::new(&path, KeyShape::TitleLink);
        store.insert(SeenKey::new("b", "https://b"));
        store.insert(SeenKey::new("a", "https://a"));
        store.save().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.find("\"a\"").unwrap() < raw.find("\"b\"").unwrap());
    }

    #[tokio::test]
    async fn test_lines_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("news.txt");

        let mut store = SeenStore::new(&path, KeyShape::TitleDate);
        store.insert(SeenKey::new("Tab\there", "2025-10-16"));
        store.insert(SeenKey::new("Plain", "2025-10-15"));
        store.save().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "Plain\t2025-10-15\nTab here\t2025-10-16\n");

        let reloaded = SeenStore::load(&path, KeyShape::TitleDate).await;
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(&SeenKey::new("Tab here", "2025-10-16")));
    }

    #[test]
    fn test_insert_tracks_dirty() {
        let mut store = SeenStore::new("seen.json", KeyShape::TitleLink);
        assert!(store.insert(SeenKey::new("a", "b")));
        assert!(store.is_dirty());
        assert!(!store.insert(SeenKey::new("a", "b")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_filter_new_only_today_and_unseen() {
        let today = d(2025, 10, 16);
        let mut store = SeenStore::new("seen.json", KeyShape::TitleLink);
        store.insert(SeenKey::new("Old news", "https://x/old"));

        let items = vec![
            item("Fresh", "https://x/fresh", today),
            item("Old news", "https://x/old", today),
            item("Yesterday", "https://x/y", d(2025, 10, 15)),
            item("Fresh", "https://x/fresh", today),
        ];
        let new = store.filter_new(&items, today);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].title, "Fresh");
    }

    #[test]
    fn test_filter_new_respects_shape() {
        let today = d(2025, 10, 16);
        let mut store = SeenStore::new("seen.json", KeyShape::TitleDate);
        store.insert(SeenKey::new("Same title", "2025-10-16"));

        // Different link, same title and day: already seen under title/date keys.
        let items = vec![item("Same title", "https://mirror/other", today)];
        assert!(store.filter_new(&items, today).is_empty());
    }

    #[test]
    fn test_filter_is_idempotent_after_marking() {
        let today = d(2025, 10, 16);
        let mut store = SeenStore::new("seen.json", KeyShape::TitleDate);
        let items = vec![
            item("One", "https://x/1", today),
            item("Two", "https://x/2", today),
        ];

        let first = store.filter_new(&items, today);
        assert_eq!(first.len(), 2);
        assert_eq!(store.mark_seen(&first), 2);

        assert!(store.filter_new(&items, today).is_empty());
        assert_eq!(store.mark_seen(&items), 0);
    }
}

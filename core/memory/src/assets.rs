use std::fs;
use std::path::PathBuf;

use tracing::warn;
use workstream_schemas::AssetDoc;

/// Transcript-like documents dropped on disk, named `YYYY-MM-DD*.md`.
/// A missing directory means an empty listing, never an error.
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".to_string());
        Self::new(dir)
    }

    /// Extract the YYYY-MM-DD prefix from a filename, if present.
    pub fn parse_date_from_name(name: &str) -> Option<&str> {
        let bytes = name.as_bytes();
        if bytes.len() < 10 {
            return None;
        }
        let dashes_ok = bytes[4] == b'-' && bytes[7] == b'-';
        let digits_ok = [0, 1, 2, 3, 5, 6, 8, 9]
            .iter()
            .all(|&i| bytes[i].is_ascii_digit());
        if dashes_ok && digits_ok {
            Some(&name[..10])
        } else {
            None
        }
    }

    /// Documents whose filename starts with the exact date, sorted by name.
    pub fn list_by_date(&self, date: &str) -> Vec<AssetDoc> {
        self.collect(|name| {
            name.starts_with(date)
                .then(|| date.to_string())
        })
    }

    /// Documents dated on or before `date`, sorted by name.
    pub fn list_upto(&self, date: &str) -> Vec<AssetDoc> {
        self.collect(|name| {
            Self::parse_date_from_name(name)
                .filter(|parsed| *parsed <= date)
                .map(str::to_string)
        })
    }

    /// Member emails from `members.md`, one per line, blanks skipped.
    pub fn member_emails(&self) -> Vec<String> {
        let path = self.dir.join("members.md");
        match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn collect(&self, date_for: impl Fn(&str) -> Option<String>) -> Vec<AssetDoc> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut docs = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".md") {
                continue;
            }
            let Some(date) = date_for(&name) else {
                continue;
            };
            match fs::read_to_string(entry.path()) {
                Ok(content) => docs.push(AssetDoc { name, date, content }),
                Err(e) => warn!("Skipping unreadable asset {}: {}", name, e),
            }
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, AssetStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = AssetStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_parse_date_from_name() {
        assert_eq!(
            AssetStore::parse_date_from_name("2025-03-01-sync.md"),
            Some("2025-03-01")
        );
        assert_eq!(AssetStore::parse_date_from_name("notes.md"), None);
        assert_eq!(AssetStore::parse_date_from_name("2025_03_01.md"), None);
        assert_eq!(AssetStore::parse_date_from_name("short"), None);
    }

    #[test]
    fn test_list_by_date_filters_and_sorts() {
        let (_dir, store) = store_with(&[
            ("2025-03-01-standup.md", "standup notes"),
            ("2025-03-01-review.md", "review notes"),
            ("2025-03-02-sync.md", "other day"),
            ("readme.md", "not dated"),
        ]);

        let docs = store.list_by_date("2025-03-01");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "2025-03-01-review.md");
        assert_eq!(docs[1].name, "2025-03-01-standup.md");
        assert!(docs.iter().all(|d| d.date == "2025-03-01"));
    }

    #[test]
    fn test_list_upto_uses_parsed_dates() {
        let (_dir, store) = store_with(&[
            ("2025-03-01-a.md", "a"),
            ("2025-03-05-b.md", "b"),
            ("2025-04-01-c.md", "c"),
        ]);

        let docs = store.list_upto("2025-03-31");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].date, "2025-03-05");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = AssetStore::new("/nonexistent/assets/dir");
        assert!(store.list_by_date("2025-03-01").is_empty());
        assert!(store.member_emails().is_empty());
    }

    #[test]
    fn test_member_emails() {
        let (_dir, store) = store_with(&[("members.md", "alice@corp.com\n\n  bob@corp.com\n")]);
        assert_eq!(
            store.member_emails(),
            vec!["alice@corp.com".to_string(), "bob@corp.com".to_string()]
        );
    }
}

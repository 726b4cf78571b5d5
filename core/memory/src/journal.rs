use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use workstream_schemas::{
    ContextEntry, ContextEntryId, ItemId, ItemKind, MemoryItem, TopicId,
};

/// Durable log of normalized memory items plus imported raw context,
/// kept separate from the in-process topic state. Writes here are
/// best-effort from the service's point of view.
pub struct MemoryJournal {
    conn: Connection,
}

impl MemoryJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        let journal = Self { conn };
        journal.init_schema()?;

        info!("Memory journal initialized");
        Ok(journal)
    }

    /// Private in-memory journal, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let journal = Self { conn };
        journal.init_schema()?;
        Ok(journal)
    }

    fn init_schema(&self) -> Result<()> {
        // Normalized memory items (append-only)
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS memory_items (
                id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                actors TEXT NOT NULL,
                tags TEXT NOT NULL,
                source TEXT,
                meta TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memory_items_topic_time
             ON memory_items (topic_id, created_at)",
            [],
        )?;

        // Imported raw context (chat exports, asset documents)
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS context_entries (
                id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL,
                author TEXT NOT NULL,
                text TEXT NOT NULL,
                tags TEXT NOT NULL,
                source TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_context_entries_topic_time
             ON context_entries (topic_id, created_at)",
            [],
        )?;

        Ok(())
    }

    /// Append normalized items for a topic.
    pub fn append_items(&self, topic_id: &TopicId, items: &[MemoryItem]) -> Result<()> {
        for item in items {
            let actors_json = serde_json::to_string(&item.actors)?;
            let tags_json = serde_json::to_string(&item.tags)?;
            let meta_json = serde_json::to_string(&item.meta)?;

            self.conn.execute(
                "INSERT INTO memory_items (id, topic_id, kind, text, actors, tags,
                                           source, meta, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    item.id.0,
                    topic_id.0,
                    item.kind.as_str(),
                    item.text,
                    actors_json,
                    tags_json,
                    item.source,
                    meta_json,
                    format_ts(&item.created_at),
                ],
            )?;
        }

        debug!("Appended {} items for topic {}", items.len(), topic_id);
        Ok(())
    }

    /// Items for a topic within [start, end], oldest first.
    pub fn items_between(
        &self,
        topic_id: &TopicId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MemoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, text, actors, tags, source, meta, created_at
             FROM memory_items
             WHERE topic_id = ?1 AND created_at >= ?2 AND created_at <= ?3
             ORDER BY created_at ASC",
        )?;

        let items = stmt
            .query_map(
                params![topic_id.0, format_ts(&start), format_ts(&end)],
                row_to_item,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Most recent items for a topic, newest first.
    pub fn recent_items(&self, topic_id: &TopicId, limit: usize) -> Result<Vec<MemoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, text, actors, tags, source, meta, created_at
             FROM memory_items
             WHERE topic_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let items = stmt
            .query_map(params![topic_id.0, limit as i64], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Record one imported raw-context entry.
    pub fn add_context(&self, entry: &ContextEntry) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;

        self.conn.execute(
            "INSERT INTO context_entries (id, topic_id, author, text, tags, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.0,
                entry.topic_id.0,
                entry.author,
                entry.text,
                tags_json,
                entry.source,
                format_ts(&entry.created_at),
            ],
        )?;

        debug!("Recorded context entry {} for topic {}", entry.id, entry.topic_id);
        Ok(())
    }

    /// Most recent imported context for a topic, newest first.
    pub fn recent_context(&self, topic_id: &TopicId, limit: usize) -> Result<Vec<ContextEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, topic_id, author, text, tags, source, created_at
             FROM context_entries
             WHERE topic_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![topic_id.0, limit as i64], row_to_context_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Drop every record; used by the explicit full-reset operation.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM memory_items", [])?;
        self.conn.execute("DELETE FROM context_entries", [])?;
        info!("Memory journal cleared");
        Ok(())
    }
}

/// Fixed-width RFC3339 so the TEXT column sorts chronologically.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn json_error(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

fn row_to_item(row: &Row) -> rusqlite::Result<MemoryItem> {
    let actors_json: String = row.get(3)?;
    let tags_json: String = row.get(4)?;
    let meta_json: String = row.get(6)?;

    let actors: Vec<String> = serde_json::from_str(&actors_json).map_err(json_error)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(json_error)?;
    let meta: HashMap<String, String> = serde_json::from_str(&meta_json).map_err(json_error)?;

    let kind_raw: String = row.get(1)?;
    let kind = ItemKind::from_label(&kind_raw).unwrap_or(ItemKind::Note);

    let created_raw: String = row.get(7)?;

    Ok(MemoryItem {
        id: ItemId(row.get(0)?),
        kind,
        text: row.get(2)?,
        actors,
        tags,
        source: row.get(5)?,
        created_at: parse_ts(&created_raw)?,
        meta,
    })
}

fn row_to_context_entry(row: &Row) -> rusqlite::Result<ContextEntry> {
    let tags_json: String = row.get(4)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(json_error)?;

    let created_raw: String = row.get(6)?;

    Ok(ContextEntry {
        id: ContextEntryId(row.get(0)?),
        topic_id: TopicId(row.get(1)?),
        author: row.get(2)?,
        text: row.get(3)?,
        tags,
        source: row.get(5)?,
        created_at: parse_ts(&created_raw)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use workstream_schemas::{generate_context_entry_id, generate_item_id, generate_topic_id};

    fn item_at(offset_secs: i64) -> MemoryItem {
        MemoryItem {
            id: generate_item_id(),
            kind: ItemKind::Fact,
            text: format!("fact at +{}", offset_secs),
            actors: vec!["u1".to_string()],
            tags: vec!["t".to_string()],
            source: Some("m-1".to_string()),
            created_at: Utc::now() + Duration::seconds(offset_secs),
            meta: HashMap::new(),
        }
    }

    #[test]
    fn test_append_and_recent_order() {
        let journal = MemoryJournal::in_memory().unwrap();
        let topic_id = generate_topic_id();

        let items: Vec<MemoryItem> = (0..5).map(|i| item_at(i)).collect();
        journal.append_items(&topic_id, &items).unwrap();

        let recent = journal.recent_items(&topic_id, 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "fact at +4");
        assert_eq!(recent[2].text, "fact at +2");
    }

    #[test]
    fn test_items_between_is_inclusive_and_sorted() {
        let journal = MemoryJournal::in_memory().unwrap();
        let topic_id = generate_topic_id();

        let items: Vec<MemoryItem> = (0..5).map(|i| item_at(i * 10)).collect();
        journal.append_items(&topic_id, &items).unwrap();

        let start = items[1].created_at;
        let end = items[3].created_at;
        let window = journal.items_between(&topic_id, start, end).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].text, "fact at +10");
        assert_eq!(window[2].text, "fact at +30");
    }

    #[test]
    fn test_item_round_trip_preserves_fields() {
        let journal = MemoryJournal::in_memory().unwrap();
        let topic_id = generate_topic_id();

        let mut item = item_at(0);
        item.kind = ItemKind::Task;
        item.meta.insert("owner".to_string(), "alice".to_string());
        journal.append_items(&topic_id, std::slice::from_ref(&item)).unwrap();

        let restored = journal.recent_items(&topic_id, 1).unwrap();
        assert_eq!(restored[0].kind, ItemKind::Task);
        assert_eq!(restored[0].actors, vec!["u1".to_string()]);
        assert_eq!(restored[0].source.as_deref(), Some("m-1"));
        assert_eq!(
            restored[0].meta.get("owner").map(String::as_str),
            Some("alice")
        );
    }

    #[test]
    fn test_topics_are_isolated() {
        let journal = MemoryJournal::in_memory().unwrap();
        let t1 = generate_topic_id();
        let t2 = generate_topic_id();

        journal.append_items(&t1, &[item_at(0)]).unwrap();
        journal.append_items(&t2, &[item_at(0), item_at(1)]).unwrap();

        assert_eq!(journal.recent_items(&t1, 10).unwrap().len(), 1);
        assert_eq!(journal.recent_items(&t2, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_context_entries_round_trip() {
        let journal = MemoryJournal::in_memory().unwrap();
        let topic_id = generate_topic_id();

        for i in 0..3 {
            let entry = ContextEntry {
                id: generate_context_entry_id(),
                topic_id: topic_id.clone(),
                author: "system".to_string(),
                text: format!("imported doc {}", i),
                tags: vec!["asset".to_string()],
                source: Some(format!("2025-03-0{}-sync.md", i + 1)),
                created_at: Utc::now() + Duration::seconds(i),
            };
            journal.add_context(&entry).unwrap();
        }

        let recent = journal.recent_context(&topic_id, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "imported doc 2");
        assert_eq!(recent[0].tags, vec!["asset".to_string()]);
    }

    #[test]
    fn test_clear_all() {
        let journal = MemoryJournal::in_memory().unwrap();
        let topic_id = generate_topic_id();
        journal.append_items(&topic_id, &[item_at(0)]).unwrap();

        journal.clear_all().unwrap();
        assert!(journal.recent_items(&topic_id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let topic_id = generate_topic_id();

        {
            let journal = MemoryJournal::new(&path).unwrap();
            journal.append_items(&topic_id, &[item_at(0)]).unwrap();
        }

        let reopened = MemoryJournal::new(&path).unwrap();
        assert_eq!(reopened.recent_items(&topic_id, 10).unwrap().len(), 1);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use workstream_schemas::{TopicId, TopicState};

/// In-process topic state keyed by topic id.
///
/// Each topic sits behind its own mutex so concurrent ingestion for the
/// same topic serializes (read-modify-write on `context`/`recent_notes`)
/// while unrelated topics proceed in parallel. Readers clone a snapshot
/// under the same per-topic lock, so they never observe a torn context.
#[derive(Default)]
pub struct TopicStore {
    topics: RwLock<HashMap<TopicId, Arc<Mutex<TopicState>>>>,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a topic, returning a snapshot of what was stored.
    pub async fn upsert(&self, topic: TopicState) -> TopicState {
        let snapshot = topic.clone();
        let mut topics = self.topics.write().await;
        topics.insert(topic.topic_id.clone(), Arc::new(Mutex::new(topic)));
        snapshot
    }

    /// Per-topic mutation handle. Callers lock it for the shortest possible
    /// read-modify-write scope and must not hold it across slow I/O.
    pub async fn handle(&self, topic_id: &TopicId) -> Option<Arc<Mutex<TopicState>>> {
        let topics = self.topics.read().await;
        topics.get(topic_id).cloned()
    }

    pub async fn snapshot(&self, topic_id: &TopicId) -> Option<TopicState> {
        let handle = self.handle(topic_id).await?;
        let topic = handle.lock().await;
        Some(topic.clone())
    }

    pub async fn list(&self) -> Vec<TopicState> {
        let handles: Vec<Arc<Mutex<TopicState>>> = {
            let topics = self.topics.read().await;
            topics.values().cloned().collect()
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.lock().await.clone());
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        snapshots
    }

    pub async fn clear(&self) {
        let mut topics = self.topics.write().await;
        topics.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use workstream_schemas::generate_topic_id;

    fn topic(title: &str) -> TopicState {
        TopicState {
            topic_id: generate_topic_id(),
            title: title.to_string(),
            goal: None,
            members: Vec::new(),
            context: Vec::new(),
            recent_notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_snapshot() {
        let store = TopicStore::new();
        let t = store.upsert(topic("alpha")).await;

        let snap = store.snapshot(&t.topic_id).await.unwrap();
        assert_eq!(snap.title, "alpha");
        assert!(store.snapshot(&generate_topic_id()).await.is_none());
    }

    #[tokio::test]
    async fn test_mutation_through_handle_is_visible() {
        let store = TopicStore::new();
        let t = store.upsert(topic("alpha")).await;

        {
            let handle = store.handle(&t.topic_id).await.unwrap();
            let mut locked = handle.lock().await;
            locked.recent_notes.push("first summary".to_string());
        }

        let snap = store.snapshot(&t.topic_id).await.unwrap();
        assert_eq!(snap.recent_notes, vec!["first summary".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_ingestion_serializes_per_topic() {
        let store = Arc::new(TopicStore::new());
        let t = store.upsert(topic("alpha")).await;

        let mut joins = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let topic_id = t.topic_id.clone();
            joins.push(tokio::spawn(async move {
                let handle = store.handle(&topic_id).await.unwrap();
                let mut locked = handle.lock().await;
                locked.recent_notes.insert(0, format!("note {}", i));
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        let snap = store.snapshot(&t.topic_id).await.unwrap();
        assert_eq!(snap.recent_notes.len(), 16);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = TopicStore::new();
        store.upsert(topic("alpha")).await;
        store.upsert(topic("beta")).await;
        assert_eq!(store.list().await.len(), 2);

        store.clear().await;
        assert!(store.list().await.is_empty());
    }
}

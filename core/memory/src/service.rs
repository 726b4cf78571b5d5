use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use workstream_schemas::{
    generate_context_entry_id, generate_topic_id, ContextEntry, MeetingDelta, MemoryItem,
    PersonalizedView, TopicId, TopicMember, TopicState,
};

use crate::error::MemoryError;
use crate::journal::MemoryJournal;
use crate::normalize::normalize_delta;
use crate::store::TopicStore;
use crate::view::build_view;

const RECENT_NOTES_LIMIT: usize = 10;

/// Orchestrates topic memory creation and updates. Collaborators are
/// injected at construction; nothing here is process-global.
pub struct MemoryService {
    store: TopicStore,
    journal: Arc<Mutex<MemoryJournal>>,
}

impl MemoryService {
    pub fn new(journal: MemoryJournal) -> Self {
        Self {
            store: TopicStore::new(),
            journal: Arc::new(Mutex::new(journal)),
        }
    }

    pub async fn create_topic(
        &self,
        title: String,
        goal: Option<String>,
        members: Vec<TopicMember>,
        topic_id: Option<TopicId>,
    ) -> TopicState {
        let topic = TopicState {
            topic_id: topic_id.unwrap_or_else(generate_topic_id),
            title,
            goal,
            members,
            context: Vec::new(),
            recent_notes: Vec::new(),
            created_at: Utc::now(),
        };
        info!("Created topic {} ({})", topic.topic_id, topic.title);
        self.store.upsert(topic).await
    }

    pub async fn get_topic(&self, topic_id: &TopicId) -> Result<TopicState, MemoryError> {
        self.store
            .snapshot(topic_id)
            .await
            .ok_or_else(|| MemoryError::TopicNotFound(topic_id.0.clone()))
    }

    pub async fn list_topics(&self) -> Vec<TopicState> {
        self.store.list().await
    }

    /// Normalize a delta into the topic context and journal the new items.
    /// The journal write is best-effort: on failure the in-memory update
    /// stands and the degradation is logged.
    pub async fn ingest_delta(
        &self,
        topic_id: &TopicId,
        delta: &MeetingDelta,
    ) -> Result<TopicState, MemoryError> {
        validate_delta(delta)?;

        let handle = self
            .store
            .handle(topic_id)
            .await
            .ok_or_else(|| MemoryError::TopicNotFound(topic_id.0.clone()))?;

        let items = normalize_delta(delta);

        let snapshot = {
            let mut topic = handle.lock().await;

            if let Some(summary) = delta.summary.as_deref() {
                let summary = summary.trim();
                if !summary.is_empty() {
                    topic.recent_notes.insert(0, summary.to_string());
                    topic.recent_notes.truncate(RECENT_NOTES_LIMIT);
                }
            }

            topic.context.extend(items.iter().cloned());
            topic
                .context
                .sort_by(|a, b| a.created_at.cmp(&b.created_at));
            topic.clone()
        };

        info!(
            "Ingested {} items into topic {} (context size {})",
            items.len(),
            topic_id,
            snapshot.context.len()
        );

        self.journal_items(topic_id, &items).await;

        Ok(snapshot)
    }

    pub async fn build_personal_view(
        &self,
        topic_id: &TopicId,
        user_id: &str,
    ) -> Result<PersonalizedView, MemoryError> {
        let topic = self.get_topic(topic_id).await?;
        Ok(build_view(&topic, user_id))
    }

    /// Register or update a member; user_id is unique within a topic.
    pub async fn add_member(
        &self,
        topic_id: &TopicId,
        member: TopicMember,
    ) -> Result<TopicState, MemoryError> {
        let handle = self
            .store
            .handle(topic_id)
            .await
            .ok_or_else(|| MemoryError::TopicNotFound(topic_id.0.clone()))?;

        let mut topic = handle.lock().await;
        match topic
            .members
            .iter_mut()
            .find(|m| m.user_id == member.user_id)
        {
            Some(existing) => *existing = member,
            None => topic.members.push(member),
        }
        Ok(topic.clone())
    }

    pub async fn list_members(&self, topic_id: &TopicId) -> Result<Vec<TopicMember>, MemoryError> {
        Ok(self.get_topic(topic_id).await?.members)
    }

    /// Import one raw context entry (chat excerpt, asset document).
    pub async fn add_context(
        &self,
        topic_id: &TopicId,
        author: String,
        text: String,
        tags: Vec<String>,
        source: Option<String>,
    ) -> Result<ContextEntry, MemoryError> {
        // Reject early so imports against unknown topics surface clearly.
        self.get_topic(topic_id).await?;

        let entry = ContextEntry {
            id: generate_context_entry_id(),
            topic_id: topic_id.clone(),
            author,
            text,
            tags,
            source,
            created_at: Utc::now(),
        };

        let journal = self.journal.lock().await;
        if let Err(e) = journal.add_context(&entry) {
            warn!("Context write degraded for topic {}: {}", topic_id, e);
        }
        Ok(entry)
    }

    pub async fn recent_context(
        &self,
        topic_id: &TopicId,
        limit: usize,
    ) -> Result<Vec<ContextEntry>, MemoryError> {
        self.get_topic(topic_id).await?;

        let journal = self.journal.lock().await;
        Ok(journal.recent_context(topic_id, limit).unwrap_or_else(|e| {
            warn!("Context read degraded for topic {}: {}", topic_id, e);
            Vec::new()
        }))
    }

    pub async fn recent_items(
        &self,
        topic_id: &TopicId,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        self.get_topic(topic_id).await?;

        let journal = self.journal.lock().await;
        Ok(journal.recent_items(topic_id, limit).unwrap_or_else(|e| {
            warn!("Journal read degraded for topic {}: {}", topic_id, e);
            Vec::new()
        }))
    }

    pub async fn items_between(
        &self,
        topic_id: &TopicId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        self.get_topic(topic_id).await?;

        let journal = self.journal.lock().await;
        Ok(journal
            .items_between(topic_id, start, end)
            .unwrap_or_else(|e| {
                warn!("Journal read degraded for topic {}: {}", topic_id, e);
                Vec::new()
            }))
    }

    /// Full reset of the in-process store and the durable journal.
    pub async fn reset(&self) {
        self.store.clear().await;
        let journal = self.journal.lock().await;
        if let Err(e) = journal.clear_all() {
            warn!("Journal clear degraded: {}", e);
        }
    }

    async fn journal_items(&self, topic_id: &TopicId, items: &[MemoryItem]) {
        if items.is_empty() {
            return;
        }
        let journal = self.journal.lock().await;
        if let Err(e) = journal.append_items(topic_id, items) {
            warn!("Journal write degraded for topic {}: {}", topic_id, e);
        }
    }
}

fn validate_delta(delta: &MeetingDelta) -> Result<(), MemoryError> {
    let groups = [
        ("facts", &delta.facts),
        ("decisions", &delta.decisions),
        ("risks", &delta.risks),
        ("notes", &delta.notes),
    ];
    for (label, entries) in groups {
        if entries.iter().any(|e| e.text.trim().is_empty()) {
            return Err(MemoryError::InvalidDelta(format!(
                "{} contains an empty text entry",
                label
            )));
        }
    }
    if delta.tasks.iter().any(|t| t.title.trim().is_empty()) {
        return Err(MemoryError::InvalidDelta(
            "task with empty title".to_string(),
        ));
    }
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// ULID and ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextEntryId(pub String);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContextEntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Topic Membership
// ============================================================================

/// A participant registered on a topic, with their declared duties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMember {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

// ============================================================================
// Memory Item Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "fact")]
    Fact,
    #[serde(rename = "decision")]
    Decision,
    #[serde(rename = "risk")]
    Risk,
    #[serde(rename = "task")]
    Task,
    #[serde(rename = "note")]
    Note,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Fact => "fact",
            ItemKind::Decision => "decision",
            ItemKind::Risk => "risk",
            ItemKind::Task => "task",
            ItemKind::Note => "note",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "fact" => Some(ItemKind::Fact),
            "decision" => Some(ItemKind::Decision),
            "risk" => Some(ItemKind::Risk),
            "task" => Some(ItemKind::Task),
            "note" => Some(ItemKind::Note),
            _ => None,
        }
    }
}

/// Normalized unit of topic memory. Immutable once created; the only
/// mutation is topic-level insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub text: String,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Only populated for task items (owner/due/notes).
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

// ============================================================================
// Meeting Delta Schema (raw input before normalization)
// ============================================================================

/// Atomic text entry extracted from a meeting or chat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaEntry {
    pub text: String,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Incoming task from a meeting delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEntry {
    pub title: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_actors: Vec<String>,
}

/// Structured payload representing one meeting's change set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingDelta {
    #[serde(default)]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub facts: Vec<DeltaEntry>,
    #[serde(default)]
    pub decisions: Vec<DeltaEntry>,
    #[serde(default)]
    pub risks: Vec<DeltaEntry>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    #[serde(default)]
    pub notes: Vec<DeltaEntry>,
}

// ============================================================================
// Topic State
// ============================================================================

/// State of one project/workstream topic. `context` stays sorted ascending
/// by `created_at`; `recent_notes` holds at most the 10 newest summaries,
/// most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicState {
    pub topic_id: TopicId,
    pub title: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub members: Vec<TopicMember>,
    #[serde(default)]
    pub context: Vec<MemoryItem>,
    #[serde(default)]
    pub recent_notes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Personalized View (derived, never persisted)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedView {
    pub topic_id: TopicId,
    pub user_id: String,
    pub highlights: Vec<String>,
    pub action_items: Vec<String>,
    pub risks: Vec<String>,
    pub decisions: Vec<String>,
    pub mentions: Vec<String>,
}

// ============================================================================
// Notification Actions
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[default]
    #[serde(rename = "notify")]
    Notify,
    #[serde(rename = "ask")]
    Ask,
    #[serde(rename = "escalate")]
    Escalate,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Notify => "notify",
            ActionKind::Ask => "ask",
            ActionKind::Escalate => "escalate",
        }
    }

    /// Lenient parse for reasoning output; unknown labels decay to notify.
    pub fn from_label(label: &str) -> Self {
        match label {
            "ask" => ActionKind::Ask,
            "escalate" => ActionKind::Escalate,
            _ => ActionKind::Notify,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "critical")]
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse for reasoning output; unknown labels decay to info.
    pub fn from_label(label: &str) -> Self {
        match label {
            "warning" => Severity::Warning,
            "critical" => Severity::Critical,
            _ => Severity::Info,
        }
    }
}

/// An action the orchestrator wants to trigger. `target_user` may be a
/// member's user id or the literal "all"; absent means untargeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAction {
    #[serde(default)]
    pub action_type: ActionKind,
    #[serde(default)]
    pub target_user: Option<String>,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of processing one meeting delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub topic: TopicState,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

// ============================================================================
// Imported Context & Assets
// ============================================================================

/// Raw context imported from outside the meeting-delta flow (chat export,
/// document, asset file). Kept separate from normalized memory items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: ContextEntryId,
    pub topic_id: TopicId,
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transcript-like document discovered on disk, named by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDoc {
    pub name: String,
    pub date: String,
    pub content: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_topic_id() -> TopicId {
    TopicId(format!("topic_{}", ulid::Ulid::new()))
}

pub fn generate_item_id() -> ItemId {
    ItemId(format!("itm_{}", ulid::Ulid::new()))
}

pub fn generate_context_entry_id() -> ContextEntryId {
    ContextEntryId(format!("ctx_{}", ulid::Ulid::new()))
}

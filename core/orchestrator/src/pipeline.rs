use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use workstream_memory::{AssetStore, MemoryError, MemoryService};
use workstream_schemas::{
    ActionKind, AssetDoc, MeetingDelta, NotificationAction, ProcessResult, Severity, TopicId,
    TopicState,
};

use crate::heuristic::transcript_actions;
use crate::parser::{extract_json, ParseError};
use crate::prompt;
use crate::reasoning::{complete, ReasoningBackend, ReasoningError};
use crate::rules::delta_fallback_actions;

/// Result of running one pipeline tier. Fallthrough to the next tier is
/// an ordinary value, not a caught exception.
#[derive(Debug)]
pub enum TierOutcome {
    Actions(Vec<NotificationAction>),
    Empty,
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("reasoning backend is not configured")]
    Disabled,

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("extracted delta is malformed: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Outcome of an asset-driven processing request.
#[derive(Debug, Serialize)]
pub struct AssetIngestReport {
    pub topic_id: TopicId,
    pub date: String,
    pub imported: usize,
    pub actions: Vec<NotificationAction>,
}

/// Turns deltas, asset documents, and on-demand requests into
/// notification actions through a strict tier chain: reasoning first,
/// then deterministic fallbacks. A reasoning failure is never fatal.
pub struct ActionOrchestrator {
    memory: Arc<MemoryService>,
    reasoning: Option<Arc<dyn ReasoningBackend>>,
    assets: Arc<AssetStore>,
}

impl ActionOrchestrator {
    pub fn new(
        memory: Arc<MemoryService>,
        reasoning: Option<Arc<dyn ReasoningBackend>>,
        assets: Arc<AssetStore>,
    ) -> Self {
        Self {
            memory,
            reasoning,
            assets,
        }
    }

    /// Ingest a structured delta and derive actions. When the reasoning
    /// tier yields nothing, fall back to the rule-based delta actions;
    /// an empty result is legitimate here.
    pub async fn process_delta(
        &self,
        topic_id: &TopicId,
        delta: &MeetingDelta,
    ) -> Result<ProcessResult, MemoryError> {
        let topic = self.memory.ingest_delta(topic_id, delta).await?;

        let actions = match self.reasoning_tier(&topic, Some(delta), None).await {
            TierOutcome::Actions(actions) => actions,
            outcome => {
                note_fallthrough("reasoning", &outcome);
                delta_fallback_actions(&topic, delta)
            }
        };

        info!(
            "Processed delta for topic {} -> {} actions",
            topic_id,
            actions.len()
        );
        Ok(ProcessResult { topic, actions })
    }

    /// Import the day's asset documents as raw context, then derive
    /// actions for the requesting user: reasoning, else line heuristics
    /// over the documents, else a single summary notice. Always yields
    /// at least one action.
    pub async fn process_assets(
        &self,
        topic_id: &TopicId,
        user_id: &str,
        date: &str,
    ) -> Result<AssetIngestReport, MemoryError> {
        let topic = self.memory.get_topic(topic_id).await?;
        let docs = self.assets.list_by_date(date);

        for doc in &docs {
            self.memory
                .add_context(
                    topic_id,
                    "system".to_string(),
                    doc.content.clone(),
                    vec!["asset".to_string()],
                    Some(doc.name.clone()),
                )
                .await?;
        }
        info!(
            "Imported {} asset documents for topic {} ({})",
            docs.len(),
            topic_id,
            date
        );

        let digest = asset_digest(date, &docs);
        let actions = match self.reasoning_tier(&topic, None, Some(&digest)).await {
            TierOutcome::Actions(actions) => actions,
            outcome => {
                note_fallthrough("reasoning", &outcome);
                let heuristic: Vec<NotificationAction> = docs
                    .iter()
                    .flat_map(|doc| transcript_actions(&doc.content, user_id))
                    .collect();
                if heuristic.is_empty() {
                    debug!("heuristic tier returned no actions; falling through");
                    vec![default_asset_action(user_id, date, &docs)]
                } else {
                    heuristic
                }
            }
        };

        Ok(AssetIngestReport {
            topic_id: topic_id.clone(),
            date: date.to_string(),
            imported: docs.len(),
            actions,
        })
    }

    /// On-demand briefing: what should this user act on right now.
    /// Same tier chain, with the heuristic pass scanning recently
    /// imported context instead of fresh documents.
    pub async fn on_demand_actions(
        &self,
        topic_id: &TopicId,
        user_id: &str,
    ) -> Result<Vec<NotificationAction>, MemoryError> {
        let topic = self.memory.get_topic(topic_id).await?;

        let request = format!("Generate current action suggestions for user {}.", user_id);
        let actions = match self.reasoning_tier(&topic, None, Some(&request)).await {
            TierOutcome::Actions(actions) => actions,
            outcome => {
                note_fallthrough("reasoning", &outcome);
                let entries = self
                    .memory
                    .recent_context(topic_id, prompt::CONTEXT_SLICE_LIMIT)
                    .await
                    .unwrap_or_default();
                let heuristic: Vec<NotificationAction> = entries
                    .iter()
                    .flat_map(|entry| transcript_actions(&entry.text, user_id))
                    .collect();
                if heuristic.is_empty() {
                    debug!("heuristic tier returned no actions; falling through");
                    vec![NotificationAction {
                        action_type: ActionKind::Notify,
                        target_user: Some(user_id.to_string()),
                        message: format!("暂无新的行动建议（主题: {}）", topic.title),
                        severity: Severity::Info,
                        tags: vec!["fallback".to_string()],
                    }]
                } else {
                    heuristic
                }
            }
        };

        Ok(actions)
    }

    /// Distill a transcript into a structured delta via the reasoning
    /// capability. Unlike action generation this surfaces failures: the
    /// caller asked specifically for an extraction.
    pub async fn extract_delta(
        &self,
        topic: &TopicState,
        transcript: &str,
        meeting_id: Option<String>,
    ) -> Result<MeetingDelta, ExtractError> {
        let backend = self.reasoning.as_ref().ok_or(ExtractError::Disabled)?;

        let prompt = prompt::delta_extraction_prompt(topic, transcript);
        let raw = complete(backend.as_ref(), &prompt).await?;
        let mut value = extract_json(&raw)?;

        if let Value::Object(map) = &mut value {
            map.insert("meeting_id".to_string(), serde_json::json!(meeting_id));
        }

        let delta: MeetingDelta = serde_json::from_value(value)?;
        Ok(delta)
    }

    /// Tier 1: prompt the reasoning capability with topic state, bounded
    /// memory/context slices, and the update under consideration. Any
    /// call or parse failure is reported as Unavailable, never raised.
    async fn reasoning_tier(
        &self,
        topic: &TopicState,
        delta: Option<&MeetingDelta>,
        extra: Option<&str>,
    ) -> TierOutcome {
        let Some(backend) = &self.reasoning else {
            return TierOutcome::Unavailable("reasoning disabled".to_string());
        };

        let memory = self
            .memory
            .recent_items(&topic.topic_id, prompt::MEMORY_SLICE_LIMIT)
            .await
            .unwrap_or_default();
        let context = self
            .memory
            .recent_context(&topic.topic_id, prompt::CONTEXT_SLICE_LIMIT)
            .await
            .unwrap_or_default();

        let prompt = prompt::action_prompt(topic, &memory, &context, extra, delta);

        let raw = match complete(backend.as_ref(), &prompt).await {
            Ok(raw) => raw,
            Err(e) => return TierOutcome::Unavailable(e.to_string()),
        };
        let value = match extract_json(&raw) {
            Ok(value) => value,
            Err(e) => return TierOutcome::Unavailable(e.to_string()),
        };

        let actions = actions_from_value(&value);
        if actions.is_empty() {
            TierOutcome::Empty
        } else {
            TierOutcome::Actions(actions)
        }
    }
}

/// Map a parsed reasoning payload to actions. Missing or unknown fields
/// take schema defaults; a non-array payload counts as no actions.
fn actions_from_value(value: &Value) -> Vec<NotificationAction> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            Some(NotificationAction {
                action_type: obj
                    .get("action_type")
                    .and_then(Value::as_str)
                    .map(ActionKind::from_label)
                    .unwrap_or_default(),
                target_user: obj
                    .get("target_user")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                severity: obj
                    .get("severity")
                    .and_then(Value::as_str)
                    .map(Severity::from_label)
                    .unwrap_or_default(),
                tags: obj
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn asset_digest(date: &str, docs: &[AssetDoc]) -> String {
    if docs.is_empty() {
        return format!("No documents found for {}.", date);
    }
    let mut digest = format!("Documents for {}:\n", date);
    for doc in docs {
        digest.push_str(&format!("## {}\n{}\n", doc.name, doc.content));
    }
    digest
}

fn default_asset_action(user_id: &str, date: &str, docs: &[AssetDoc]) -> NotificationAction {
    let message = if docs.is_empty() {
        format!("没有找到 {} 的资料", date)
    } else {
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        format!("已处理 {} 的资料: {}", date, names.join(", "))
    };
    NotificationAction {
        action_type: ActionKind::Notify,
        target_user: Some(user_id.to_string()),
        message,
        severity: Severity::Info,
        tags: vec!["fallback".to_string()],
    }
}

fn note_fallthrough(tier: &str, outcome: &TierOutcome) {
    match outcome {
        TierOutcome::Empty => debug!("{} tier returned no actions; falling through", tier),
        TierOutcome::Unavailable(reason) => {
            warn!("{} tier unavailable ({}); falling through", tier, reason)
        }
        TierOutcome::Actions(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use workstream_memory::MemoryJournal;
    use workstream_schemas::{DeltaEntry, TaskEntry, TopicMember};

    struct FailingBackend;

    #[async_trait]
    impl ReasoningBackend for FailingBackend {
        async fn invoke(
            &self,
            _prompt: &str,
        ) -> Result<crate::reasoning::ReasoningReply, ReasoningError> {
            Err(ReasoningError::Api {
                status: 500,
                body: "down".to_string(),
            })
        }
    }

    struct CannedBackend {
        reply: &'static str,
    }

    #[async_trait]
    impl ReasoningBackend for CannedBackend {
        async fn invoke(
            &self,
            _prompt: &str,
        ) -> Result<crate::reasoning::ReasoningReply, ReasoningError> {
            Ok(crate::reasoning::ReasoningReply::new(self.reply))
        }
    }

    fn orchestrator(reasoning: Option<Arc<dyn ReasoningBackend>>) -> ActionOrchestrator {
        orchestrator_with_assets(reasoning, AssetStore::new("/nonexistent"))
    }

    fn orchestrator_with_assets(
        reasoning: Option<Arc<dyn ReasoningBackend>>,
        assets: AssetStore,
    ) -> ActionOrchestrator {
        let memory = Arc::new(MemoryService::new(MemoryJournal::in_memory().unwrap()));
        ActionOrchestrator::new(memory, reasoning, Arc::new(assets))
    }

    async fn make_topic(orch: &ActionOrchestrator, members: Vec<TopicMember>) -> TopicState {
        orch.memory
            .create_topic("Test topic".to_string(), None, members, None)
            .await
    }

    fn member(user_id: &str, role: Option<&str>) -> TopicMember {
        TopicMember {
            user_id: user_id.to_string(),
            display_name: None,
            role: role.map(String::from),
            responsibilities: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_tier_fallthrough_on_reasoning_failure() {
        let orch = orchestrator(Some(Arc::new(FailingBackend)));
        let topic = make_topic(&orch, vec![]).await;

        let delta = MeetingDelta {
            tasks: vec![TaskEntry {
                title: "Follow up".to_string(),
                owner: Some("u1".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = orch.process_delta(&topic.topic_id, &delta).await.unwrap();
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].target_user.as_deref(), Some("u1"));
        assert_eq!(result.actions[0].action_type, ActionKind::Notify);
    }

    #[tokio::test]
    async fn test_reasoning_actions_win_over_rules() {
        let reply = r#"```json
[{"action_type": "escalate", "target_user": "alice", "message": "DB risk needs a decision", "severity": "critical", "tags": ["db"]}]
```"#;
        let orch = orchestrator(Some(Arc::new(CannedBackend { reply })));
        let topic = make_topic(&orch, vec![member("alice", Some("pm"))]).await;

        let delta = MeetingDelta {
            risks: vec![DeltaEntry {
                text: "DB migration risk".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = orch.process_delta(&topic.topic_id, &delta).await.unwrap();
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].action_type, ActionKind::Escalate);
        assert_eq!(result.actions[0].severity, Severity::Critical);
        assert_eq!(result.actions[0].message, "DB risk needs a decision");
    }

    #[tokio::test]
    async fn test_unknown_labels_decay_to_defaults() {
        let reply = r#"[{"action_type": "page", "message": "hello", "severity": "panic"}]"#;
        let orch = orchestrator(Some(Arc::new(CannedBackend { reply })));
        let topic = make_topic(&orch, vec![]).await;

        let result = orch
            .process_delta(&topic.topic_id, &MeetingDelta::default())
            .await
            .unwrap();
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].action_type, ActionKind::Notify);
        assert_eq!(result.actions[0].severity, Severity::Info);
        assert!(result.actions[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_non_array_reply_falls_through_to_rules() {
        let reply = r#"{"note": "not an action list"}"#;
        let orch = orchestrator(Some(Arc::new(CannedBackend { reply })));
        let topic = make_topic(&orch, vec![member("alice", Some("pm"))]).await;

        let delta = MeetingDelta {
            risks: vec![DeltaEntry {
                text: "DB migration risk".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = orch.process_delta(&topic.topic_id, &delta).await.unwrap();
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].message, "风险提醒: DB migration risk");
    }

    #[tokio::test]
    async fn test_plain_delta_may_yield_no_actions() {
        let orch = orchestrator(None);
        let topic = make_topic(&orch, vec![]).await;

        let delta = MeetingDelta {
            facts: vec![DeltaEntry {
                text: "Nothing actionable".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = orch.process_delta(&topic.topic_id, &delta).await.unwrap();
        assert!(result.actions.is_empty());
    }

    #[tokio::test]
    async fn test_assets_flow_uses_heuristic_tier() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2025-03-01-standup.md"),
            "Attendees: alice, bob\nalice: bob please rotate the API keys\n",
        )
        .unwrap();

        let orch = orchestrator_with_assets(None, AssetStore::new(dir.path()));
        let topic = make_topic(&orch, vec![]).await;

        let report = orch
            .process_assets(&topic.topic_id, "bob", "2025-03-01")
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].message, "bob please rotate the API keys");
        assert_eq!(report.actions[0].tags, vec!["heuristic".to_string()]);

        // Documents were persisted as raw context.
        let entries = orch
            .memory
            .recent_context(&topic.topic_id, 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source.as_deref(), Some("2025-03-01-standup.md"));
    }

    #[tokio::test]
    async fn test_assets_flow_defaults_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2025-03-01-standup.md"),
            "alice: carol takes deployment\n",
        )
        .unwrap();

        let orch = orchestrator_with_assets(None, AssetStore::new(dir.path()));
        let topic = make_topic(&orch, vec![]).await;

        let report = orch
            .process_assets(&topic.topic_id, "bob", "2025-03-01")
            .await
            .unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].tags, vec!["fallback".to_string()]);
        assert!(report.actions[0].message.contains("2025-03-01-standup.md"));
        assert_eq!(report.actions[0].target_user.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_on_demand_always_yields_an_action() {
        let orch = orchestrator(None);
        let topic = make_topic(&orch, vec![]).await;

        let actions = orch
            .on_demand_actions(&topic.topic_id, "bob")
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].tags, vec!["fallback".to_string()]);
    }

    #[tokio::test]
    async fn test_on_demand_scans_imported_context() {
        let orch = orchestrator(None);
        let topic = make_topic(&orch, vec![]).await;

        orch.memory
            .add_context(
                &topic.topic_id,
                "import".to_string(),
                "lead: bob owns the postmortem".to_string(),
                Vec::new(),
                None,
            )
            .await
            .unwrap();

        let actions = orch
            .on_demand_actions(&topic.topic_id, "bob")
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].message, "bob owns the postmortem");
        assert_eq!(actions[0].tags, vec!["heuristic".to_string()]);
    }

    #[tokio::test]
    async fn test_extract_delta_stamps_meeting_id() {
        let reply = r#"{"facts": [{"text": "API frozen"}], "tasks": []}"#;
        let orch = orchestrator(Some(Arc::new(CannedBackend { reply })));
        let topic = make_topic(&orch, vec![]).await;

        let delta = orch
            .extract_delta(&topic, "transcript", Some("m-7".to_string()))
            .await
            .unwrap();
        assert_eq!(delta.meeting_id.as_deref(), Some("m-7"));
        assert_eq!(delta.facts.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_delta_fails_without_backend() {
        let orch = orchestrator(None);
        let topic = make_topic(&orch, vec![]).await;

        let err = orch
            .extract_delta(&topic, "transcript", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Disabled));
    }

    #[tokio::test]
    async fn test_extract_delta_surfaces_parse_failure() {
        let orch = orchestrator(Some(Arc::new(CannedBackend {
            reply: "nothing useful",
        })));
        let topic = make_topic(&orch, vec![]).await;

        let err = orch
            .extract_delta(&topic, "transcript", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}

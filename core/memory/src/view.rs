use workstream_schemas::{ItemKind, MemoryItem, PersonalizedView, TopicState};

use crate::relevance::is_relevant;

const MAX_HIGHLIGHTS: usize = 8;
const MAX_GENERAL_HIGHLIGHTS: usize = 3;
const MAX_ACTION_ITEMS: usize = 5;
const MAX_RISKS: usize = 5;
const MAX_DECISIONS: usize = 5;
const MAX_MENTIONS: usize = 10;

/// Build a participant's bounded projection of the topic context,
/// scanning most-recent-first.
///
/// The scan terminates as soon as 8 highlights are collected. Relevant
/// items past that point are skipped entirely, even though they would
/// land in other buckets. Intentional: the highlight cap bounds the
/// whole scan, not just the highlight list.
pub fn build_view(topic: &TopicState, user_id: &str) -> PersonalizedView {
    let member = topic.members.iter().find(|m| m.user_id == user_id);

    let mut highlights: Vec<String> = Vec::new();
    let mut action_items: Vec<String> = Vec::new();
    let mut risks: Vec<String> = Vec::new();
    let mut decisions: Vec<String> = Vec::new();
    let mut mentions: Vec<String> = Vec::new();

    for item in topic.context.iter().rev() {
        if highlights.len() >= MAX_HIGHLIGHTS {
            break;
        }
        let relevant = is_relevant(item, user_id, member);
        let formatted = format_item(item);

        if !relevant && highlights.len() < MAX_GENERAL_HIGHLIGHTS {
            highlights.push(formatted);
            continue;
        }
        if relevant {
            mentions.push(formatted.clone());
            match item.kind {
                ItemKind::Task => action_items.push(formatted),
                ItemKind::Risk => risks.push(formatted),
                ItemKind::Decision => decisions.push(formatted),
                ItemKind::Fact | ItemKind::Note => {
                    if !highlights.contains(&formatted) {
                        highlights.push(formatted);
                    }
                }
            }
        }
    }

    highlights.truncate(MAX_HIGHLIGHTS);
    action_items.truncate(MAX_ACTION_ITEMS);
    risks.truncate(MAX_RISKS);
    decisions.truncate(MAX_DECISIONS);
    mentions.truncate(MAX_MENTIONS);

    PersonalizedView {
        topic_id: topic.topic_id.clone(),
        user_id: user_id.to_string(),
        highlights,
        action_items,
        risks,
        decisions,
        mentions,
    }
}

fn format_item(item: &MemoryItem) -> String {
    let prefix = item.kind.as_str().to_uppercase();
    match &item.source {
        Some(source) => format!("{}: {} [source={}]", prefix, item.text, source),
        None => format!("{}: {}", prefix, item.text),
    }
}

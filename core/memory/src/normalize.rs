use std::collections::HashMap;

use chrono::Utc;
use workstream_schemas::{
    generate_item_id, DeltaEntry, ItemKind, MeetingDelta, MemoryItem, TaskEntry,
};

/// Convert one meeting delta into typed memory items, in group order:
/// facts, decisions, risks, tasks, notes. Every item carries the delta's
/// meeting id as provenance.
pub fn normalize_delta(delta: &MeetingDelta) -> Vec<MemoryItem> {
    let source = delta.meeting_id.as_deref();

    let mut items = Vec::new();
    items.extend(normalize_group(ItemKind::Fact, &delta.facts, source));
    items.extend(normalize_group(ItemKind::Decision, &delta.decisions, source));
    items.extend(normalize_group(ItemKind::Risk, &delta.risks, source));
    items.extend(normalize_tasks(&delta.tasks, source));
    items.extend(normalize_group(ItemKind::Note, &delta.notes, source));
    items
}

fn normalize_group(kind: ItemKind, entries: &[DeltaEntry], source: Option<&str>) -> Vec<MemoryItem> {
    entries
        .iter()
        .map(|entry| MemoryItem {
            id: generate_item_id(),
            kind,
            text: entry.text.trim().to_string(),
            actors: entry.actors.clone(),
            tags: entry.tags.clone(),
            source: source.map(str::to_string),
            created_at: Utc::now(),
            meta: HashMap::new(),
        })
        .collect()
}

fn normalize_tasks(tasks: &[TaskEntry], source: Option<&str>) -> Vec<MemoryItem> {
    tasks
        .iter()
        .map(|task| {
            let mut meta = HashMap::new();
            if let Some(owner) = &task.owner {
                meta.insert("owner".to_string(), owner.clone());
            }
            if let Some(due) = &task.due {
                meta.insert("due".to_string(), due.clone());
            }
            if let Some(notes) = &task.notes {
                meta.insert("notes".to_string(), notes.clone());
            }

            let mut text = task.title.clone();
            if let Some(due) = &task.due {
                text = format!("{} (due {})", text, due);
            }
            if let Some(notes) = &task.notes {
                text = format!("{} - {}", text, notes);
            }

            let actors = match &task.owner {
                Some(owner) => vec![owner.clone()],
                None => task.related_actors.clone(),
            };

            MemoryItem {
                id: generate_item_id(),
                kind: ItemKind::Task,
                text: text.trim().to_string(),
                actors,
                tags: task.tags.clone(),
                source: source.map(str::to_string),
                created_at: Utc::now(),
                meta,
            }
        })
        .collect()
}

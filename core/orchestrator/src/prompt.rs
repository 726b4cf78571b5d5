use workstream_schemas::{ContextEntry, MeetingDelta, MemoryItem, TopicState};

/// Bound on persisted memory items included in an action prompt.
pub const MEMORY_SLICE_LIMIT: usize = 40;
/// Bound on imported raw-context entries included in an action prompt.
pub const CONTEXT_SLICE_LIMIT: usize = 20;
/// Bound on recent summaries included in any prompt.
pub const NOTES_SLICE_LIMIT: usize = 5;

/// Assemble the action-generation prompt: topic metadata, roster, recent
/// summaries, bounded memory and context slices, optional extra text, and
/// the delta under consideration.
pub fn action_prompt(
    topic: &TopicState,
    memory: &[MemoryItem],
    context: &[ContextEntry],
    extra: Option<&str>,
    delta: Option<&MeetingDelta>,
) -> String {
    let delta_block = delta
        .and_then(|d| serde_json::to_string_pretty(d).ok())
        .unwrap_or_else(|| "(no new delta; review the state above)".to_string());

    format!(
        r#"You are a project-manager assistant. From the topic state and the latest update, produce the list of notification actions to trigger, as a JSON array. Each element:
{{"action_type": "notify"|"ask"|"escalate", "target_user": "<user_id or all>", "message": "...", "severity": "info"|"warning"|"critical", "tags": ["..."]}}

Rules:
- Use warning/critical for risks and blockers.
- Never invent users that do not appear in the roster.
- Use action_type "ask" with a question sentence when clarification is needed.
- Return an empty array when nothing is noteworthy.

Topic:
- title: {title}
- goal: {goal}
- members:
{members}
- recent summaries:
{notes}

Persisted memory (newest first, at most {memory_limit}):
{memory}

Imported context (newest first, at most {context_limit}):
{context}

Additional context:
{extra}

Latest update:
{delta}

Return only the JSON array, no code fences."#,
        title = topic.title,
        goal = topic.goal.as_deref().unwrap_or("not provided"),
        members = member_lines(topic),
        notes = notes_lines(topic),
        memory_limit = MEMORY_SLICE_LIMIT,
        memory = memory_lines(memory),
        context_limit = CONTEXT_SLICE_LIMIT,
        context = context_lines(context),
        extra = extra.unwrap_or("(none)"),
        delta = delta_block,
    )
}

/// Assemble the transcript-to-delta extraction prompt.
pub fn delta_extraction_prompt(topic: &TopicState, transcript: &str) -> String {
    format!(
        r#"You are a project-memory extraction assistant. Distill the meeting content into a structured delta and output JSON with the fields: facts, decisions, risks, tasks, notes.
- facts/decisions/risks/notes: arrays of {{"text": "...", "actors": ["user_id"], "tags": ["..."]}}
- tasks: arrays of {{"title": "...", "owner": "user_id", "due": "YYYY-MM-DD", "notes": "...", "tags": ["..."], "related_actors": ["user_id"]}}

Requirements:
- Only record what was actually said; leave arrays empty otherwise.
- Keep texts short, no extra commentary.

Topic:
- title: {title}
- goal: {goal}
- members:
{members}
- recent summaries:
{notes}

Meeting content:
{transcript}

Output the JSON object directly, no code fences."#,
        title = topic.title,
        goal = topic.goal.as_deref().unwrap_or("not provided"),
        members = member_lines(topic),
        notes = notes_lines(topic),
        transcript = transcript,
    )
}

fn member_lines(topic: &TopicState) -> String {
    if topic.members.is_empty() {
        return "(none)".to_string();
    }
    topic
        .members
        .iter()
        .map(|m| {
            let role = m.role.as_deref().unwrap_or("member");
            let duties = if m.responsibilities.is_empty() {
                "no declared responsibilities".to_string()
            } else {
                m.responsibilities.join(", ")
            };
            format!("- {} ({}): {}", m.user_id, role, duties)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn notes_lines(topic: &TopicState) -> String {
    if topic.recent_notes.is_empty() {
        return "(none)".to_string();
    }
    topic
        .recent_notes
        .iter()
        .take(NOTES_SLICE_LIMIT)
        .map(|note| format!("- {}", note))
        .collect::<Vec<_>>()
        .join("\n")
}

fn memory_lines(memory: &[MemoryItem]) -> String {
    if memory.is_empty() {
        return "(none)".to_string();
    }
    memory
        .iter()
        .take(MEMORY_SLICE_LIMIT)
        .map(|item| {
            let source = item
                .source
                .as_deref()
                .map(|s| format!(" [source={}]", s))
                .unwrap_or_default();
            format!("- [{}] {}{}", item.kind.as_str(), item.text, source)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_lines(context: &[ContextEntry]) -> String {
    if context.is_empty() {
        return "(none)".to_string();
    }
    context
        .iter()
        .take(CONTEXT_SLICE_LIMIT)
        .map(|entry| format!("- {}: {}", entry.author, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

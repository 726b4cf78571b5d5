use workstream_schemas::{MemoryItem, TopicMember};

/// Decide whether a memory item matters to a participant. An item is
/// relevant when the user appears in its actors, owns it as a task, or
/// (for registered members) any declared responsibility occurs in the
/// item text, case-insensitively.
pub fn is_relevant(item: &MemoryItem, user_id: &str, member: Option<&TopicMember>) -> bool {
    if item.actors.iter().any(|actor| actor == user_id) {
        return true;
    }
    if item.meta.get("owner").map(String::as_str) == Some(user_id) {
        return true;
    }
    if let Some(member) = member {
        let text_lower = item.text.to_lowercase();
        if member
            .responsibilities
            .iter()
            .any(|resp| text_lower.contains(&resp.to_lowercase()))
        {
            return true;
        }
    }
    false
}

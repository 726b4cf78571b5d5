use workstream_schemas::{ActionKind, NotificationAction, Severity};

/// Explicit-mention marker that addresses every participant.
const CATCH_ALL_MARKER: &str = "@all";

/// Line prefixes that identify attendee rosters rather than content.
const ATTENDEE_MARKERS: &[&str] = &["attendee", "participant", "参会"];

/// Deterministic extraction of actions from transcript-like text, used
/// when the reasoning tier produced nothing. Keeps speaker-style lines
/// (`name: said something`) that mention the target user, the local part
/// of their id, or the catch-all marker.
pub fn transcript_actions(text: &str, user_id: &str) -> Vec<NotificationAction> {
    let local_part = user_id.split('@').next().unwrap_or(user_id);

    let mut actions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if ATTENDEE_MARKERS.iter().any(|m| lower.starts_with(m)) {
            continue;
        }
        let Some(message) = split_after_separator(line) else {
            continue;
        };
        if !(line.contains(user_id) || line.contains(local_part) || line.contains(CATCH_ALL_MARKER))
        {
            continue;
        }
        let message = message.trim();
        if message.is_empty() {
            continue;
        }
        actions.push(NotificationAction {
            action_type: ActionKind::Notify,
            target_user: Some(user_id.to_string()),
            message: message.to_string(),
            severity: Severity::Info,
            tags: vec!["heuristic".to_string()],
        });
    }
    actions
}

/// Remainder after the first colon-style separator; transcripts mix
/// ASCII and full-width colons.
fn split_after_separator(line: &str) -> Option<&str> {
    let ascii = line.find(':');
    let wide = line.find('：');
    let (idx, len) = match (ascii, wide) {
        (Some(a), Some(w)) if a < w => (a, 1),
        (Some(_), Some(w)) => (w, '：'.len_utf8()),
        (Some(a), None) => (a, 1),
        (None, Some(w)) => (w, '：'.len_utf8()),
        (None, None) => return None,
    };
    Some(&line[idx + len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_lines_mentioning_user() {
        let transcript = "\
alice: bob should review the billing PR today
carol: unrelated chatter about lunch
dave: bob@corp.com owns the rollback plan
";
        let actions = transcript_actions(transcript, "bob@corp.com");
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].message, "bob should review the billing PR today");
        assert_eq!(actions[1].message, "bob@corp.com owns the rollback plan");
        assert!(actions
            .iter()
            .all(|a| a.tags == vec!["heuristic".to_string()]));
        assert!(actions
            .iter()
            .all(|a| a.target_user.as_deref() == Some("bob@corp.com")));
    }

    #[test]
    fn test_catch_all_marker_matches_everyone() {
        let transcript = "alice: @all please update your status docs";
        let actions = transcript_actions(transcript, "zoe@corp.com");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].message, "@all please update your status docs");
    }

    #[test]
    fn test_skips_attendee_lines() {
        let transcript = "\
Attendees: alice, bob, carol
Participants: bob@corp.com
alice: bob take the migration task
";
        let actions = transcript_actions(transcript, "bob");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].message, "bob take the migration task");
    }

    #[test]
    fn test_skips_lines_without_separator() {
        let transcript = "bob was mentioned here but nobody spoke\nalice: bob ping infra";
        let actions = transcript_actions(transcript, "bob");
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_full_width_separator() {
        let transcript = "项目经理：请 bob 跟进数据库迁移";
        let actions = transcript_actions(transcript, "bob");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].message, "请 bob 跟进数据库迁移");
    }

    #[test]
    fn test_empty_remainder_is_discarded() {
        let transcript = "bob:   ";
        let actions = transcript_actions(transcript, "bob");
        assert!(actions.is_empty());
    }

    #[test]
    fn test_no_mention_no_action() {
        let transcript = "alice: carol should deploy on Friday";
        let actions = transcript_actions(transcript, "bob");
        assert!(actions.is_empty());
    }
}

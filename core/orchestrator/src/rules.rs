use workstream_schemas::{
    ActionKind, MeetingDelta, NotificationAction, Severity, TopicState,
};

/// Roles that receive risk warnings ahead of the wider roster.
const ESCALATION_ROLES: &[&str] = &["pm", "owner", "admin"];

/// Deterministic delta-to-action fallback: owner, risk, and decision
/// notifications derived directly from the delta, independent of any
/// reasoning output.
pub fn delta_fallback_actions(topic: &TopicState, delta: &MeetingDelta) -> Vec<NotificationAction> {
    let mut actions = Vec::new();
    actions.extend(task_actions(delta));
    actions.extend(risk_actions(topic, delta));
    actions.extend(decision_actions(topic, delta));
    actions
}

fn task_actions(delta: &MeetingDelta) -> Vec<NotificationAction> {
    delta
        .tasks
        .iter()
        .map(|task| {
            let mut message = format!("新任务: {}", task.title);
            if let Some(due) = &task.due {
                message.push_str(&format!("，截止 {}", due));
            }
            if let Some(meeting_id) = &delta.meeting_id {
                message.push_str(&format!("（来自会议 {}）", meeting_id));
            }
            NotificationAction {
                action_type: ActionKind::Notify,
                target_user: task.owner.clone(),
                message,
                severity: Severity::Info,
                tags: task.tags.clone(),
            }
        })
        .collect()
}

fn risk_actions(topic: &TopicState, delta: &MeetingDelta) -> Vec<NotificationAction> {
    let escalation_users = members_with_role(topic, ESCALATION_ROLES);
    let targets = if escalation_users.is_empty() {
        topic.members.iter().map(|m| m.user_id.clone()).collect()
    } else {
        escalation_users
    };

    let mut actions = Vec::new();
    for risk in &delta.risks {
        for user in &targets {
            let mut text = risk.text.clone();
            if let Some(meeting_id) = &delta.meeting_id {
                text.push_str(&format!("（会议 {}）", meeting_id));
            }
            actions.push(NotificationAction {
                action_type: ActionKind::Notify,
                target_user: Some(user.clone()),
                message: format!("风险提醒: {}", text),
                severity: Severity::Warning,
                tags: risk.tags.clone(),
            });
        }
    }
    actions
}

fn decision_actions(topic: &TopicState, delta: &MeetingDelta) -> Vec<NotificationAction> {
    let members: Vec<String> = topic.members.iter().map(|m| m.user_id.clone()).collect();

    let mut actions = Vec::new();
    for decision in &delta.decisions {
        let targets = if decision.actors.is_empty() {
            &members
        } else {
            &decision.actors
        };
        for user in targets {
            let mut text = decision.text.clone();
            if let Some(meeting_id) = &delta.meeting_id {
                text.push_str(&format!("（会议 {}）", meeting_id));
            }
            actions.push(NotificationAction {
                action_type: ActionKind::Notify,
                target_user: Some(user.clone()),
                message: format!("决策更新: {}", text),
                severity: Severity::Info,
                tags: decision.tags.clone(),
            });
        }
    }
    actions
}

fn members_with_role(topic: &TopicState, roles: &[&str]) -> Vec<String> {
    topic
        .members
        .iter()
        .filter(|member| {
            member
                .role
                .as_deref()
                .map(|role| roles.contains(&role.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|member| member.user_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use workstream_schemas::{generate_topic_id, DeltaEntry, TaskEntry, TopicMember};

    fn member(user_id: &str, role: Option<&str>) -> TopicMember {
        TopicMember {
            user_id: user_id.to_string(),
            display_name: None,
            role: role.map(String::from),
            responsibilities: Vec::new(),
        }
    }

    fn topic(members: Vec<TopicMember>) -> TopicState {
        TopicState {
            topic_id: generate_topic_id(),
            title: "T".to_string(),
            goal: None,
            members,
            context: Vec::new(),
            recent_notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_action_targets_owner_with_due() {
        let delta = MeetingDelta {
            meeting_id: Some("m-3".to_string()),
            tasks: vec![TaskEntry {
                title: "Ship fix".to_string(),
                owner: Some("u1".to_string()),
                due: Some("2025-03-01".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let actions = delta_fallback_actions(&topic(vec![]), &delta);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_user.as_deref(), Some("u1"));
        assert_eq!(
            actions[0].message,
            "新任务: Ship fix，截止 2025-03-01（来自会议 m-3）"
        );
        assert_eq!(actions[0].severity, Severity::Info);
    }

    #[test]
    fn test_task_without_owner_is_untargeted() {
        let delta = MeetingDelta {
            tasks: vec![TaskEntry {
                title: "Ownerless".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let actions = delta_fallback_actions(&topic(vec![]), &delta);
        assert_eq!(actions.len(), 1);
        assert!(actions[0].target_user.is_none());
    }

    #[test]
    fn test_risk_warns_escalation_roles_only() {
        let members = vec![
            member("alice", Some("pm")),
            member("bob", None),
            member("carol", Some("Admin")),
        ];
        let delta = MeetingDelta {
            risks: vec![DeltaEntry {
                text: "DB migration risk".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let actions = delta_fallback_actions(&topic(members), &delta);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].target_user.as_deref(), Some("alice"));
        assert_eq!(actions[1].target_user.as_deref(), Some("carol"));
        assert!(actions
            .iter()
            .all(|a| a.message == "风险提醒: DB migration risk"));
        assert!(actions.iter().all(|a| a.severity == Severity::Warning));
    }

    #[test]
    fn test_risk_falls_back_to_all_members() {
        let members = vec![member("bob", None), member("dave", Some("dev"))];
        let delta = MeetingDelta {
            risks: vec![DeltaEntry {
                text: "Scope creep".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let actions = delta_fallback_actions(&topic(members), &delta);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_decision_targets_actors_or_everyone() {
        let members = vec![member("alice", None), member("bob", None)];

        let targeted = MeetingDelta {
            meeting_id: Some("m-9".to_string()),
            decisions: vec![DeltaEntry {
                text: "Freeze API".to_string(),
                actors: vec!["bob".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let actions = delta_fallback_actions(&topic(members.clone()), &targeted);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_user.as_deref(), Some("bob"));
        assert_eq!(actions[0].message, "决策更新: Freeze API（会议 m-9）");

        let broadcast = MeetingDelta {
            decisions: vec![DeltaEntry {
                text: "Freeze API".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let actions = delta_fallback_actions(&topic(members), &broadcast);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_empty_delta_yields_no_actions() {
        let actions =
            delta_fallback_actions(&topic(vec![member("alice", Some("pm"))]), &MeetingDelta::default());
        assert!(actions.is_empty());
    }
}

//! Task derivation: turns one booking into the follow-up tasks it needs.
//!
//! Everything here is pure. The idempotency key is the only link between a
//! booking and the task created for it in earlier runs, so its format must not
//! change: `{prefix}-{event id}-{task type slug}`.

use chrono::{DateTime, Duration, Utc};
use shared::models::{CandidateTask, NormalizedEvent, RuleAnchor, TaskRule};

pub const WELCOME_LETTER: &str = "Send Welcome Letter";
pub const REVIEW_REQUEST: &str = "Send Review Request";
pub const DOOR_CODE: &str = "Make Door Code";

/// The standing rule table
pub fn default_rules() -> Vec<TaskRule> {
    vec![
        TaskRule::new(WELCOME_LETTER, -3, RuleAnchor::Start),
        TaskRule::new(REVIEW_REQUEST, 2, RuleAnchor::End),
        TaskRule::new(DOOR_CODE, -3, RuleAnchor::Start).only_for("Lake Breeze"),
    ]
}

/// Lower-cases a task type and joins its words with single hyphens.
pub fn slug(task_type: &str) -> String {
    task_type
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub fn idempotency_key(prefix: &str, event_id: &str, task_type: &str) -> String {
    format!("{}-{}-{}", prefix, event_id, slug(task_type))
}

pub fn due_date(event: &NormalizedEvent, rule: &TaskRule) -> DateTime<Utc> {
    let anchor = match rule.anchor {
        RuleAnchor::Start => event.start,
        RuleAnchor::End => event.end,
    };
    anchor + Duration::days(rule.offset_days)
}

/// Candidate tasks for one event, in rule order.
pub fn derive(
    event: &NormalizedEvent,
    rules: &[TaskRule],
    source_name: &str,
    key_prefix: &str,
) -> Vec<CandidateTask> {
    rules
        .iter()
        .filter(|rule| rule.scope.admits(source_name))
        .map(|rule| CandidateTask {
            idempotency_key: idempotency_key(key_prefix, &event.id, &rule.task_type),
            event_id: event.id.clone(),
            task_type: rule.task_type.clone(),
            content: format!("{} ({})", rule.task_type, event.title),
            due: due_date(event, rule),
            label: source_name.to_string(),
        })
        .collect()
}

/// Days the existing-task query must reach before and after the event window
/// so every due date a rule can produce is covered: `(before, after)`.
pub fn reach(rules: &[TaskRule]) -> (i64, i64) {
    rules.iter().fold((0, 0), |(before, after), rule| {
        if rule.offset_days < 0 {
            (before.max(-rule.offset_days), after)
        } else {
            (before, after.max(rule.offset_days))
        }
    })
}

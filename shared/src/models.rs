use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A named, coloured origin of booking events (one rental unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub name: String,
    pub color: String,
    pub feed_url: String,
    /// Replaces the global rule set for this source when present.
    #[serde(default)]
    pub rules: Option<Vec<TaskRule>>,
}

/// One booking interval, after the display offset correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Owning source name
    #[serde(rename = "location")]
    pub source: String,
    pub description: Option<String>,
    pub background_color: String,
    pub all_day: bool,
}

/// Which instant of an event a rule's offset is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAnchor {
    Start,
    End,
}

/// Sources a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "sources")]
pub enum SourceScope {
    Any,
    Only(Vec<String>),
}

impl SourceScope {
    pub fn admits(&self, source_name: &str) -> bool {
        match self {
            SourceScope::Any => true,
            SourceScope::Only(names) => names.iter().any(|n| n == source_name),
        }
    }
}

/// A task generation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRule {
    pub task_type: String,
    pub offset_days: i64,
    pub anchor: RuleAnchor,
    pub scope: SourceScope,
}

impl TaskRule {
    pub fn new(task_type: impl Into<String>, offset_days: i64, anchor: RuleAnchor) -> Self {
        Self {
            task_type: task_type.into(),
            offset_days,
            anchor,
            scope: SourceScope::Any,
        }
    }

    pub fn only_for(mut self, source_name: impl Into<String>) -> Self {
        self.scope = SourceScope::Only(vec![source_name.into()]);
        self
    }
}

/// A task that should exist for an event, before checking whether it does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTask {
    pub idempotency_key: String,
    pub event_id: String,
    pub task_type: String,
    pub content: String,
    pub due: DateTime<Utc>,
    pub label: String,
}

/// A task as known to the external task store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTaskRecord {
    pub id: String,
    pub content: String,
    pub description: String,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    pub priority: u8,
    pub project_id: Option<String>,
    pub labels: Vec<String>,
}

/// Input for creating a task in the external store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub content: String,
    /// Carries the idempotency key
    pub description: String,
    pub due: DateTime<Utc>,
    pub labels: Vec<String>,
}

impl From<&CandidateTask> for NewTask {
    fn from(candidate: &CandidateTask) -> Self {
        NewTask {
            content: candidate.content.clone(),
            description: candidate.idempotency_key.clone(),
            due: candidate.due,
            labels: vec![candidate.label.clone()],
        }
    }
}

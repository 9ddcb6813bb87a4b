use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExternalTaskRecord, NormalizedEvent};

// ============================================================================
// Calendar API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvents {
    pub name: String,
    pub color: String,
    pub events: Vec<NormalizedEvent>,
}

/// A source that contributed no events this run, and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub created: usize,
    pub duplicates: usize,
    pub out_of_window: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    pub events: Vec<SourceEvents>,
    pub tasks: Vec<TaskResponse>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<SourceError>,
    #[serde(default)]
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_warning: Option<String>,
}

/// Body returned when a calendar run fails outright. Keeps the arrays so the
/// calendar widget always has something to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarFailureResponse {
    pub error: String,
    pub details: String,
    pub events: Vec<SourceEvents>,
    pub tasks: Vec<TaskResponse>,
}

// ============================================================================
// Task API Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub completed: bool,
    /// `YYYY-MM-DD`, or empty when the task has no due date
    pub due_date: String,
    pub priority: u8,
    pub project: Option<String>,
    pub labels: Vec<String>,
}

impl From<ExternalTaskRecord> for TaskResponse {
    fn from(task: ExternalTaskRecord) -> Self {
        TaskResponse {
            id: task.id,
            name: task.content,
            description: task.description,
            completed: task.completed,
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            priority: task.priority,
            project: task.project_id,
            labels: task.labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub success: bool,
    pub id: String,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

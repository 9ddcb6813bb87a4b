//! Shapes a run report into the calendar API payload.

use chrono::{DateTime, Utc};
use shared::api::{CalendarResponse, SourceError, SourceEvents, TaskResponse};
use shared::models::ExternalTaskRecord;

use crate::reconcile::ReconcileReport;

/// Task list for display: ordered by due date, undated tasks last.
pub fn task_list(tasks: Vec<ExternalTaskRecord>) -> Vec<TaskResponse> {
    let mut tasks = tasks;
    tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date));
    tasks.into_iter().map(TaskResponse::from).collect()
}

pub fn calendar_response(
    report: &ReconcileReport,
    tasks: Vec<ExternalTaskRecord>,
    now: DateTime<Utc>,
) -> CalendarResponse {
    let mut events = Vec::with_capacity(report.sources.len());
    let mut errors = Vec::new();

    for outcome in &report.sources {
        if let Err(ref e) = outcome.result {
            errors.push(SourceError {
                source: outcome.source.name.clone(),
                kind: e.kind().to_string(),
                message: e.to_string(),
            });
        }
        events.push(SourceEvents {
            name: outcome.source.name.clone(),
            color: outcome.source.color.clone(),
            events: outcome.events().to_vec(),
        });
    }

    CalendarResponse {
        events,
        tasks: task_list(tasks),
        last_updated: now,
        errors,
        summary: report.summary(),
        store_warning: report.store_warning.as_ref().map(|e| e.to_string()),
    }
}

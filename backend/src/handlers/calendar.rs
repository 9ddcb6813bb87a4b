use axum::{extract::State, Json};
use chrono::Utc;
use reconciler::present::calendar_response;
use shared::api::CalendarResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Runs one reconciliation and returns the merged events with the current
/// task list. Per-source failures are reported inside a 200 response.
pub async fn get_calendar(State(state): State<SharedState>) -> ApiResult<Json<CalendarResponse>> {
    let report = state.reconciler.run(Utc::now().date_naive()).await;

    let tasks = state
        .store()
        .list_all_tasks(state.task_list_limit())
        .await
        .map_err(|e| ApiError::Calendar(e.to_string()))?;

    Ok(Json(calendar_response(&report, tasks, Utc::now())))
}

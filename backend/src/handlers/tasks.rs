use axum::{
    extract::{Path, State},
    Json,
};
use reconciler::present::task_list;
use shared::api::{DeleteTaskResponse, TaskResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

pub async fn list_tasks(State(state): State<SharedState>) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = state
        .store()
        .list_all_tasks(state.task_list_limit())
        .await
        .map_err(|e| ApiError::Store {
            error: "Error listing tasks".to_string(),
            details: e.to_string(),
        })?;

    Ok(Json(task_list(tasks)))
}

pub async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteTaskResponse>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::bad_request("Task ID is required"));
    }

    match state.store().delete_task(id).await {
        Ok(true) => {
            tracing::info!(task_id = %id, "Deleted task");
            Ok(Json(DeleteTaskResponse {
                success: true,
                id: id.to_string(),
            }))
        }
        Ok(false) => Err(ApiError::Upstream {
            error: "Failed to delete task".to_string(),
            details: Some(format!("task {} was not deleted", id)),
        }),
        Err(e) => Err(ApiError::Store {
            error: "Error deleting task".to_string(),
            details: reconciler::Error::Delete {
                id: id.to_string(),
                message: e.message,
            }
            .to_string(),
        }),
    }
}

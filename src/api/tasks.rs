//! Task API endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::models::Task;
use crate::AppState;

/// GET /tasks/{task_id} - Status of a queued task.
pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<i64>) -> ApiResult<Task> {
    success(state.queue.get_task(task_id).await?)
}
